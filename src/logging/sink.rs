use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::Local;

use super::ledger::{format_row, LEDGER_HEADER};
use crate::models::{CollectionRecord, FileHashRecord, LogEvent, Severity};

/// Observer invoked for every event the sink accepts.
pub type LogListener = Box<dyn Fn(&LogEvent) + Send + Sync>;

/// Open targets of one run
struct SinkFiles {
    log_path: PathBuf,
    ledger_path: PathBuf,
    log: BufWriter<File>,
    ledger: BufWriter<File>,
}

/// Run-scoped evidence log: a human-readable stream plus a CSV ledger.
///
/// The orchestrator creates one per run and hands it to modules as an
/// `Arc<EvidenceLog>`. Writes before `initialize` or after `close` still reach
/// the console mirror and the listener; only the files are skipped.
pub struct EvidenceLog {
    files: Mutex<Option<SinkFiles>>,
    inventory: Mutex<Vec<FileHashRecord>>,
    listener: Option<LogListener>,
}

/// Poisoning only means a module panicked mid-write; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl EvidenceLog {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(None),
            inventory: Mutex::new(Vec::new()),
            listener: None,
        }
    }

    pub fn with_listener(listener: LogListener) -> Self {
        Self {
            files: Mutex::new(None),
            inventory: Mutex::new(Vec::new()),
            listener: Some(listener),
        }
    }

    /// Open `collection_<ts>.log` and `collection_<ts>.csv` inside `output_dir`.
    ///
    /// Any targets still open from a previous call are closed first. Both files
    /// are truncated so a ledger never carries rows from an earlier run.
    pub fn initialize(&self, output_dir: &Path) -> Result<()> {
        self.close();

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = output_dir.join(format!("collection_{}.log", stamp));
        let ledger_path = output_dir.join(format!("collection_{}.csv", stamp));

        let log_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&log_path)
            .context(format!("Failed to open log file {}", log_path.display()))?;

        let ledger_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&ledger_path)
            .context(format!("Failed to open ledger {}", ledger_path.display()))?;

        let mut ledger = BufWriter::new(ledger_file);
        writeln!(ledger, "{}", LEDGER_HEADER)
            .and_then(|_| ledger.flush())
            .context("Failed to write ledger header")?;

        *lock(&self.files) = Some(SinkFiles {
            log_path,
            ledger_path,
            log: BufWriter::new(log_file),
            ledger,
        });
        lock(&self.inventory).clear();

        self.info("", &format!("Evidence log initialized in {}", output_dir.display()));
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        lock(&self.files).is_some()
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        lock(&self.files).as_ref().map(|f| f.log_path.clone())
    }

    pub fn ledger_path(&self) -> Option<PathBuf> {
        lock(&self.files).as_ref().map(|f| f.ledger_path.clone())
    }

    /// Append an event to the human stream.
    pub fn log(&self, severity: Severity, module: &str, message: &str) {
        self.write_event(LogEvent::new(severity, module, message));
    }

    fn write_event(&self, event: LogEvent) {
        mirror_to_console(&event);

        if let Some(files) = lock(&self.files).as_mut() {
            if let Err(e) = writeln!(files.log, "{}", event.human_line()) {
                log::error!("Failed to write evidence log: {}", e);
            }
        }

        if let Some(listener) = &self.listener {
            listener(&event);
        }
    }

    pub fn debug(&self, module: &str, message: &str) {
        self.log(Severity::Debug, module, message);
    }

    pub fn info(&self, module: &str, message: &str) {
        self.log(Severity::Info, module, message);
    }

    pub fn warning(&self, module: &str, message: &str) {
        self.log(Severity::Warning, module, message);
    }

    pub fn error(&self, module: &str, message: &str) {
        self.log(Severity::Error, module, message);
    }

    pub fn critical(&self, module: &str, message: &str) {
        self.log(Severity::Critical, module, message);
    }

    pub fn success(&self, module: &str, message: &str) {
        self.log(Severity::Success, module, message);
    }

    /// Append one row to the ledger only. Each row is flushed before returning.
    pub fn log_collection(&self, module: &str, record: &CollectionRecord) {
        if let Some(files) = lock(&self.files).as_mut() {
            let row = format_row(&Local::now(), Severity::Info, module, record);
            let written = writeln!(files.ledger, "{}", row).and_then(|_| files.ledger.flush());
            if let Err(e) = written {
                log::error!("Failed to write collection ledger: {}", e);
            }
        }
    }

    /// Ledger a hashed artifact and add it to the run inventory.
    pub fn record_artifact(&self, record: FileHashRecord) {
        let status = if record.digests.is_empty() { "unhashed" } else { "success" };
        self.log_collection(
            &record.module,
            &CollectionRecord {
                action: "collect".to_string(),
                status: status.to_string(),
                details: String::new(),
                file_path: record.path.display().to_string(),
                file_size: record.size,
                digests: record.digests.clone(),
            },
        );
        lock(&self.inventory).push(record);
    }

    /// Every artifact recorded since `initialize`, in ledger order.
    pub fn inventory(&self) -> Vec<FileHashRecord> {
        lock(&self.inventory).clone()
    }

    pub fn flush(&self) {
        if let Some(files) = lock(&self.files).as_mut() {
            if let Err(e) = files.log.flush().and_then(|_| files.ledger.flush()) {
                log::error!("Failed to flush evidence log: {}", e);
            }
        }
    }

    /// Flush and release both targets. Does nothing when nothing is open.
    pub fn close(&self) {
        self.flush();
        lock(&self.files).take();
    }
}

impl Default for EvidenceLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EvidenceLog {
    fn drop(&mut self) {
        self.close();
    }
}

fn mirror_to_console(event: &LogEvent) {
    let line = if event.module.is_empty() {
        event.message.clone()
    } else {
        format!("[{}] {}", event.module, event.message)
    };

    match event.severity {
        Severity::Debug => {}
        Severity::Info | Severity::Success => log::info!("{}", line),
        Severity::Warning => log::warn!("{}", line),
        Severity::Error | Severity::Critical => log::error!("{}", line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(module: &str, path: &str) -> FileHashRecord {
        let mut digests = BTreeMap::new();
        digests.insert("md5".to_string(), "d41d8cd98f00b204e9800998ecf8427e".to_string());
        FileHashRecord {
            module: module.to_string(),
            path: PathBuf::from(path),
            size: 0,
            digests,
        }
    }

    #[test]
    fn test_human_stream_and_ledger_are_separate() {
        let dir = TempDir::new().unwrap();
        let sink = EvidenceLog::new();
        sink.initialize(dir.path()).unwrap();

        sink.warning("network", "ARP cache unavailable");
        sink.record_artifact(record("network", "/out/network/interfaces.txt"));
        let log_path = sink.log_path().unwrap();
        let ledger_path = sink.ledger_path().unwrap();
        sink.close();

        let human = fs::read_to_string(log_path).unwrap();
        let ledger = fs::read_to_string(ledger_path).unwrap();

        assert!(human.contains("WARNING [network]: ARP cache unavailable"));
        assert!(!human.contains("interfaces.txt"));

        let lines: Vec<&str> = ledger.lines().collect();
        assert_eq!(lines[0], LEDGER_HEADER);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains(",network,collect,success,"));
        assert!(!ledger.contains("ARP cache unavailable"));
    }

    #[test]
    fn test_close_without_initialize_is_safe() {
        let sink = EvidenceLog::new();
        sink.close();
        sink.close();
        sink.info("", "still mirrored to the console");
        assert!(!sink.is_open());
    }

    #[test]
    fn test_reinitialize_resets_inventory() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let sink = EvidenceLog::new();

        sink.initialize(first.path()).unwrap();
        sink.record_artifact(record("a", "/a/1"));
        assert_eq!(sink.inventory().len(), 1);

        sink.initialize(second.path()).unwrap();
        assert!(sink.inventory().is_empty());
        assert!(sink.log_path().unwrap().starts_with(second.path()));
    }

    #[test]
    fn test_listener_sees_every_severity() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink = EvidenceLog::with_listener(Box::new(move |event: &LogEvent| {
            captured.lock().unwrap().push(event.severity);
        }));

        sink.debug("m", "d");
        sink.success("m", "s");
        sink.critical("m", "c");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Severity::Debug, Severity::Success, Severity::Critical]
        );
    }
}
