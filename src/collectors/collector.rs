use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::logging::EvidenceLog;
use crate::models::{ModuleInfo, ModuleState};
use crate::orchestrator::CancellationToken;

/// Everything a module may touch while it runs.
#[derive(Clone)]
pub struct ModuleContext {
    /// Root of the run's output tree
    pub output_root: PathBuf,
    /// Hash algorithms requested for the run
    pub algorithms: Vec<String>,
    pub log: Arc<EvidenceLog>,
    pub cancel: CancellationToken,
}

impl ModuleContext {
    pub fn new(
        output_root: impl Into<PathBuf>,
        algorithms: Vec<String>,
        log: Arc<EvidenceLog>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            output_root: output_root.into(),
            algorithms,
            log,
            cancel,
        }
    }

    /// `<output_root>/<module_id>`
    pub fn module_dir(&self, module_id: &str) -> PathBuf {
        self.output_root.join(module_id)
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }
}

/// Lifecycle contract every collection module implements.
///
/// The orchestrator calls `initialize`, then `execute` when initialization
/// succeeded, then `cleanup` unconditionally. Returning `Err` marks the step
/// as failed; panics are caught by the caller and treated the same way.
#[cfg_attr(test, mockall::automock)]
pub trait CollectionModule: Send {
    /// Prepare the module; modules needing elevation check it here.
    fn initialize(&mut self, ctx: &ModuleContext) -> Result<()>;

    /// Gather artifacts and hash them once every write is complete.
    fn execute(&mut self, ctx: &ModuleContext) -> Result<()>;

    /// Release resources. Failures are logged, never escalated.
    fn cleanup(&mut self, ctx: &ModuleContext) -> Result<()>;

    fn get_status(&self) -> ModuleState;

    /// Completion percentage in `0.0..=100.0`.
    fn get_progress(&self) -> f32;

    fn get_module_info(&self) -> ModuleInfo;
}
