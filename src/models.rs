use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Severity attached to every log event of a run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Success,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Success => "SUCCESS",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a single collection module.
///
/// `Initialized -> Running -> {Completed | Failed}`, with
/// `Initialized -> Failed` when `initialize()` does not succeed and
/// `Initialized -> Stopped` for modules a stop request kept from starting.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Initialized,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl ModuleState {
    /// Whether the module's lifecycle reached `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ModuleState::Completed | ModuleState::Failed)
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Initialized => "initialized",
            ModuleState::Running => "running",
            ModuleState::Completed => "completed",
            ModuleState::Failed => "failed",
            ModuleState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Static description a module reports about itself.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
}

impl ModuleInfo {
    pub fn new(id: &str, name: &str, version: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            description: description.to_string(),
        }
    }
}

/// One collected artifact and its digests, computed once at hash time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileHashRecord {
    pub module: String,
    pub path: PathBuf,
    pub size: u64,
    pub digests: BTreeMap<String, String>,
}

/// Structured chain-of-custody payload for one ledger row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectionRecord {
    pub action: String,
    pub status: String,
    pub details: String,
    pub file_path: String,
    pub file_size: u64,
    pub digests: BTreeMap<String, String>,
}

/// Immutable record written into the evidence log.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub module: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(severity: Severity, module: &str, message: &str) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            module: module.to_string(),
            message: message.to_string(),
        }
    }

    /// Human log line: `[timestamp] SEVERITY [module]: message`
    pub fn human_line(&self) -> String {
        let ts = self.timestamp.format("%Y-%m-%d %H:%M:%S");
        if self.module.is_empty() {
            format!("[{}] {}: {}", ts, self.severity, self.message)
        } else {
            format!("[{}] {} [{}]: {}", ts, self.severity, self.module, self.message)
        }
    }
}

/// Run-level facts consumed by the report and the JSON summary.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub hostname: String,
    pub os: String,
    pub user: String,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub total_modules: usize,
    pub completed_modules: usize,
    pub failed_modules: Vec<String>,
    pub stopped: bool,
}
