use crate::models::Severity;
use crate::utils::compress::CompressionProgress;

pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;
pub type LogCallback = Box<dyn Fn(&str, Severity) + Send + Sync>;
pub type ModuleCompletedCallback = Box<dyn Fn(&str, bool) + Send + Sync>;
pub type CompressionCallback = Box<dyn Fn(&CompressionProgress) + Send + Sync>;
pub type CompleteCallback = Box<dyn Fn(bool, &str) + Send + Sync>;

/// Observers of one run. All are optional and are called from the worker
/// thread, except `on_log` which also receives the notice emitted by `stop()`.
#[derive(Default)]
pub struct RunCallbacks {
    /// `(completed, total)` after every module
    pub on_progress: Option<ProgressCallback>,
    /// Every log event of the run, `[module] message` when a module is named
    pub on_log: Option<LogCallback>,
    /// `(module_id, success)` after every module
    pub on_module_completed: Option<ModuleCompletedCallback>,
    /// Throttled archive progress
    pub on_compression_progress: Option<CompressionCallback>,
    /// `(success, message)`, exactly once and last
    pub on_complete: Option<CompleteCallback>,
}

impl RunCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, f: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_log(mut self, f: impl Fn(&str, Severity) + Send + Sync + 'static) -> Self {
        self.on_log = Some(Box::new(f));
        self
    }

    pub fn on_module_completed(mut self, f: impl Fn(&str, bool) + Send + Sync + 'static) -> Self {
        self.on_module_completed = Some(Box::new(f));
        self
    }

    pub fn on_compression_progress(
        mut self,
        f: impl Fn(&CompressionProgress) + Send + Sync + 'static,
    ) -> Self {
        self.on_compression_progress = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn(bool, &str) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub(crate) fn progress(&self, completed: usize, total: usize) {
        if let Some(cb) = &self.on_progress {
            cb(completed, total);
        }
    }

    pub(crate) fn log(&self, message: &str, severity: Severity) {
        if let Some(cb) = &self.on_log {
            cb(message, severity);
        }
    }

    pub(crate) fn module_completed(&self, module_id: &str, success: bool) {
        if let Some(cb) = &self.on_module_completed {
            cb(module_id, success);
        }
    }

    pub(crate) fn compression_progress(&self, progress: &CompressionProgress) {
        if let Some(cb) = &self.on_compression_progress {
            cb(progress);
        }
    }

    pub(crate) fn complete(&self, success: bool, message: &str) {
        if let Some(cb) = &self.on_complete {
            cb(success, message);
        }
    }
}
