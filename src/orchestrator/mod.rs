//! Collection orchestration.
//!
//! The [`Orchestrator`] owns at most one active run. `start` resolves module
//! ids, prepares the output root and the run's [`EvidenceLog`], then hands
//! the run to a dedicated worker thread and returns immediately. Modules run
//! strictly in request order; a failing module never aborts the run.
//!
//! ```no_run
//! use evidence_collector::config::CollectionConfig;
//! use evidence_collector::orchestrator::{CollectionRequest, Orchestrator, RunCallbacks};
//!
//! let orchestrator = Orchestrator::new();
//! let request = CollectionRequest::new(
//!     vec!["live_system".into(), "network".into()],
//!     "/evidence/case-42",
//!     CollectionConfig::default(),
//! );
//! let callbacks = RunCallbacks::new()
//!     .on_progress(|done, total| println!("{}/{}", done, total))
//!     .on_complete(|ok, msg| println!("{}: {}", ok, msg));
//!
//! orchestrator.start(request, callbacks)?;
//! let outcome = orchestrator.wait();
//! # Ok::<(), evidence_collector::error::CollectionError>(())
//! ```

mod cancel;
mod events;
mod post_steps;
mod run;

pub use cancel::CancellationToken;
pub use events::RunCallbacks;
pub use post_steps::{planned_steps, run_best_effort, PostStep};
pub use run::{ModuleRecord, RunOutcome};

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use chrono::Local;
use log::{debug, warn};
use uuid::Uuid;

use crate::collectors::{CollectionModule, ModuleRegistry};
use crate::config::CollectionConfig;
use crate::error::CollectionError;
use crate::logging::EvidenceLog;
use crate::models::Severity;
use run::{execute_run, RunPlan};

/// What to collect and where.
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    pub module_ids: Vec<String>,
    pub output_dir: PathBuf,
    pub config: CollectionConfig,
}

impl CollectionRequest {
    pub fn new(module_ids: Vec<String>, output_dir: impl Into<PathBuf>, config: CollectionConfig) -> Self {
        Self {
            module_ids,
            output_dir: output_dir.into(),
            config,
        }
    }
}

/// Handles the controller keeps on the active run
struct ActiveRun {
    cancel: CancellationToken,
    callbacks: Arc<RunCallbacks>,
}

pub struct Orchestrator {
    registry: Arc<ModuleRegistry>,
    is_running: Arc<AtomicBool>,
    active: Mutex<Option<ActiveRun>>,
    worker: Mutex<Option<JoinHandle<RunOutcome>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears the running flag unless the run was handed to the worker.
struct StartGuard<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(false, Ordering::SeqCst);
        }
    }
}

impl Orchestrator {
    /// Orchestrator over the built-in modules.
    pub fn new() -> Self {
        Self::with_registry(ModuleRegistry::builtin())
    }

    pub fn with_registry(registry: ModuleRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            is_running: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Start a run on a worker thread.
    ///
    /// Fails without side effects when a run is already active. Unknown or
    /// unconstructible module ids are skipped; when none remain, nothing is
    /// created on disk.
    pub fn start(&self, request: CollectionRequest, callbacks: RunCallbacks) -> Result<(), CollectionError> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CollectionError::AlreadyRunning);
        }
        let mut guard = StartGuard {
            flag: &self.is_running,
            armed: true,
        };

        // A finished previous worker is reaped here; its outcome was never collected.
        if let Some(previous) = lock(&self.worker).take() {
            let _ = previous.join();
        }

        let callbacks = Arc::new(callbacks);
        let mut modules: Vec<(String, Box<dyn CollectionModule>)> = Vec::new();
        let mut skipped = Vec::new();

        for id in &request.module_ids {
            match self.registry.create(id, &request.config.module_settings(id)) {
                Ok(module) => modules.push((id.clone(), module)),
                Err(e) => {
                    warn!("Skipping module {}: {}", id, e);
                    callbacks.log(&format!("Skipping module {}: {}", id, e), Severity::Warning);
                    skipped.push(e.to_string());
                }
            }
        }

        if modules.is_empty() {
            return Err(CollectionError::NoModulesResolved);
        }

        fs::create_dir_all(&request.output_dir).map_err(|source| CollectionError::OutputDirectory {
            path: request.output_dir.clone(),
            source,
        })?;

        let listener_callbacks = Arc::clone(&callbacks);
        let log = Arc::new(EvidenceLog::with_listener(Box::new(move |event| {
            let message = if event.module.is_empty() {
                event.message.clone()
            } else {
                format!("[{}] {}", event.module, event.message)
            };
            listener_callbacks.log(&message, event.severity);
        })));
        log.initialize(&request.output_dir)
            .map_err(|e| CollectionError::LogInitialization(format!("{:#}", e)))?;
        for reason in &skipped {
            log.warning("", &format!("Skipped: {}", reason));
        }

        let cancel = CancellationToken::new();
        let plan = RunPlan {
            run_id: Uuid::new_v4().to_string(),
            output_dir: request.output_dir,
            config: request.config,
            modules,
            log: Arc::clone(&log),
            cancel: cancel.clone(),
            callbacks: Arc::clone(&callbacks),
            started: Local::now(),
        };

        *lock(&self.active) = Some(ActiveRun {
            cancel,
            callbacks: Arc::clone(&callbacks),
        });

        let is_running = Arc::clone(&self.is_running);
        let handle = thread::Builder::new()
            .name("collection-worker".to_string())
            .spawn(move || execute_run(plan, is_running))
            .map_err(|e| {
                log.close();
                CollectionError::WorkerSpawn(e)
            })?;

        *lock(&self.worker) = Some(handle);
        guard.armed = false;
        debug!("Collection worker started");
        Ok(())
    }

    /// Request cooperative cancellation of the active run.
    ///
    /// The module currently executing finishes; no further module starts.
    pub fn stop(&self) {
        if !self.is_running() {
            debug!("Stop requested with no active run");
            return;
        }

        if let Some(active) = lock(&self.active).as_ref() {
            active.cancel.cancel();
            let notice = "Stop requested; collection will stop after the current module";
            warn!("{}", notice);
            active.callbacks.log(notice, Severity::Warning);
        }
    }

    /// Block until the active run's worker finishes.
    ///
    /// Returns `None` when no run was started since the last `wait`.
    pub fn wait(&self) -> Option<RunOutcome> {
        let handle = lock(&self.worker).take()?;
        let outcome = handle.join().ok();
        lock(&self.active).take();
        outcome
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
