//! Body of the worker thread: module loop, post-steps, terminal event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;

use super::cancel::CancellationToken;
use super::events::RunCallbacks;
use super::post_steps::{compress_step, panic_message, planned_steps, report_step, run_best_effort, verify_step, PostStep};
use crate::collectors::{CollectionModule, ModuleContext};
use crate::config::CollectionConfig;
use crate::constants::{MSG_COLLECTION_SUCCESS, MSG_STOPPED_BY_USER};
use crate::logging::EvidenceLog;
use crate::models::{ModuleState, RunSummary};
use crate::utils::compress::ArchiveSummary;

/// Final state of one module within a run.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleRecord {
    pub id: String,
    pub name: String,
    pub state: ModuleState,
    pub error: Option<String>,
}

/// Everything a finished run produced, returned by `Orchestrator::wait`.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub message: String,
    pub output_dir: PathBuf,
    pub modules: Vec<ModuleRecord>,
    pub archive: Option<ArchiveSummary>,
    pub stopped: bool,
}

impl RunOutcome {
    /// Modules whose `execute` succeeded.
    pub fn completed(&self) -> usize {
        self.modules.iter().filter(|m| m.state == ModuleState::Completed).count()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.modules
            .iter()
            .filter(|m| m.state == ModuleState::Failed)
            .map(|m| m.id.as_str())
            .collect()
    }
}

/// A resolved, ready-to-run collection.
pub(crate) struct RunPlan {
    pub run_id: String,
    pub output_dir: PathBuf,
    pub config: CollectionConfig,
    pub modules: Vec<(String, Box<dyn CollectionModule>)>,
    pub log: Arc<EvidenceLog>,
    pub cancel: CancellationToken,
    pub callbacks: Arc<RunCallbacks>,
    pub started: DateTime<Local>,
}

/// Run `f`, converting both `Err` and panics into a message.
fn guarded(f: impl FnOnce() -> Result<()>) -> std::result::Result<(), String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn current_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Entry point of the worker thread.
///
/// Always emits exactly one terminal event, closes the sink, then clears
/// `is_running`.
pub(crate) fn execute_run(plan: RunPlan, is_running: Arc<AtomicBool>) -> RunOutcome {
    let log = Arc::clone(&plan.log);
    let callbacks = Arc::clone(&plan.callbacks);
    let output_dir = plan.output_dir.clone();

    let outcome = match catch_unwind(AssertUnwindSafe(|| run_collection(plan))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = format!("Collection failed: {}", panic_message(payload.as_ref()));
            log.critical("", &message);
            RunOutcome {
                success: false,
                message,
                output_dir,
                modules: Vec::new(),
                archive: None,
                stopped: false,
            }
        }
    };

    log.close();
    callbacks.complete(outcome.success, &outcome.message);
    is_running.store(false, Ordering::SeqCst);
    outcome
}

fn run_collection(mut plan: RunPlan) -> RunOutcome {
    let log = Arc::clone(&plan.log);
    let callbacks = Arc::clone(&plan.callbacks);
    let ctx = ModuleContext::new(
        plan.output_dir.clone(),
        plan.config.hashing.algorithms.clone(),
        Arc::clone(&log),
        plan.cancel.clone(),
    );

    let total = plan.modules.len();
    log.info("", &format!("Starting collection run {} with {} module(s)", plan.run_id, total));

    let mut records: Vec<ModuleRecord> = plan
        .modules
        .iter()
        .map(|(id, module)| ModuleRecord {
            id: id.clone(),
            name: module.get_module_info().name,
            state: ModuleState::Initialized,
            error: None,
        })
        .collect();

    let mut stopped = false;

    for (index, (id, module)) in plan.modules.iter_mut().enumerate() {
        if plan.cancel.is_cancelled() {
            stopped = true;
            break;
        }

        let record = &mut records[index];
        log.info(id, &format!("Starting module: {}", record.name));

        match guarded(|| module.initialize(&ctx)) {
            Err(reason) => {
                log.error(id, &format!("Initialization failed: {}", reason));
                record.state = ModuleState::Failed;
                record.error = Some(reason);
            }
            Ok(()) => {
                record.state = ModuleState::Running;
                let executed = guarded(|| module.execute(&ctx));

                if let Err(reason) = guarded(|| module.cleanup(&ctx)) {
                    log.warning(id, &format!("Cleanup failed: {}", reason));
                }

                match executed {
                    Ok(()) => {
                        record.state = ModuleState::Completed;
                        log.success(id, &format!("Module completed: {}", record.name));
                    }
                    Err(reason) => {
                        log.error(id, &format!("Execution failed: {}", reason));
                        record.state = ModuleState::Failed;
                        record.error = Some(reason);
                    }
                }
            }
        }

        callbacks.module_completed(id, record.state == ModuleState::Completed);
        callbacks.progress(index + 1, total);
    }

    if stopped {
        for record in records.iter_mut().filter(|r| r.state == ModuleState::Initialized) {
            record.state = ModuleState::Stopped;
        }
    }

    let mut outcome = RunOutcome {
        success: false,
        message: String::new(),
        output_dir: plan.output_dir.clone(),
        modules: records,
        archive: None,
        stopped,
    };

    if stopped {
        log.warning("", "Collection stopped by user");
        outcome.message = MSG_STOPPED_BY_USER.to_string();
        return outcome;
    }

    let summary = RunSummary {
        run_id: plan.run_id.clone(),
        hostname: current_hostname(),
        os: std::env::consts::OS.to_string(),
        user: current_user(),
        started: plan.started,
        finished: Local::now(),
        total_modules: total,
        completed_modules: outcome.completed(),
        failed_modules: outcome.failed().iter().map(|s| s.to_string()).collect(),
        stopped: false,
    };

    for step in planned_steps(&plan.config) {
        match step {
            PostStep::Report => {
                run_best_effort(step, &log, || report_step(&plan.output_dir, &summary, &log));
            }
            PostStep::Verify => {
                run_best_effort(step, &log, || verify_step(&log));
            }
            PostStep::Compress => {
                outcome.archive = run_best_effort(step, &log, || {
                    compress_step(&plan.output_dir, &plan.config.compression.format, &log, &callbacks)
                })
                .flatten();
            }
        }
    }

    let failed = summary.failed_modules.len();
    outcome.success = true;
    outcome.message = if failed == 0 {
        log.success("", MSG_COLLECTION_SUCCESS);
        MSG_COLLECTION_SUCCESS.to_string()
    } else {
        let message = format!("Collection completed with {} failed module(s)", failed);
        log.warning("", &message);
        message
    };

    outcome
}
