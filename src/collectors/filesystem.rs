//! File system triage: listings of temp directories and of recently
//! modified files under the user's home.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use walkdir::WalkDir;

use super::artifacts::ModuleCore;
use super::collector::{CollectionModule, ModuleContext};
use crate::config::ModuleSettings;
use crate::logging::escape_csv;
use crate::models::{ModuleInfo, ModuleState};

pub const MODULE_ID: &str = "filesystem";

const DEFAULT_MAX_ENTRIES: usize = 5000;
const DEFAULT_RECENT_DAYS: u64 = 7;
const DEFAULT_MAX_DEPTH: usize = 6;

/// One listed file
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
}

pub struct FilesystemModule {
    core: ModuleCore,
    max_entries: usize,
    recent_window: Duration,
    max_depth: usize,
    temp_dirs: Vec<PathBuf>,
    home_dir: Option<PathBuf>,
}

fn parse_setting<T: std::str::FromStr>(settings: &ModuleSettings, key: &str, default: T) -> Result<T> {
    match settings.get(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, value)),
        None => Ok(default),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

impl FilesystemModule {
    /// Settings: `max_entries`, `recent_days`, `max_depth`, and the
    /// `temp_dir` / `home_dir` overrides.
    pub fn new(settings: &ModuleSettings) -> Result<Self> {
        let temp_dirs = match settings.get("temp_dir") {
            Some(dir) => vec![PathBuf::from(dir)],
            None => {
                let mut dirs = vec![std::env::temp_dir()];
                if cfg!(unix) {
                    for extra in ["/tmp", "/var/tmp"] {
                        let extra = PathBuf::from(extra);
                        if !dirs.contains(&extra) {
                            dirs.push(extra);
                        }
                    }
                }
                dirs
            }
        };

        Ok(Self {
            core: ModuleCore::new(Self::info()),
            max_entries: parse_setting(settings, "max_entries", DEFAULT_MAX_ENTRIES)?,
            recent_window: Duration::from_secs(
                parse_setting(settings, "recent_days", DEFAULT_RECENT_DAYS)? * 24 * 3600,
            ),
            max_depth: parse_setting(settings, "max_depth", DEFAULT_MAX_DEPTH)?,
            temp_dirs,
            home_dir: settings.get("home_dir").map(PathBuf::from).or_else(home_dir),
        })
    }

    pub fn info() -> ModuleInfo {
        ModuleInfo::new(
            MODULE_ID,
            "File System",
            env!("CARGO_PKG_VERSION"),
            "Temp directory listings and recently modified files in the user's home",
        )
    }

    fn collect(&mut self, ctx: &ModuleContext) -> Result<()> {
        let mut temp_entries = Vec::new();
        for dir in &self.temp_dirs {
            let remaining = self.max_entries.saturating_sub(temp_entries.len());
            temp_entries.extend(list_files(dir, self.max_depth, remaining, |_| true));
        }
        ctx.log.info(MODULE_ID, &format!("Listed {} temp files", temp_entries.len()));
        self.core.write_text(ctx, "temp_listing.csv", &entries_to_csv(&temp_entries))?;
        self.core.set_progress(40.0);

        match &self.home_dir {
            Some(home) => {
                let cutoff = SystemTime::now()
                    .checked_sub(self.recent_window)
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                let recent = list_files(home, self.max_depth, self.max_entries, |meta| {
                    meta.modified().map(|m| m >= cutoff).unwrap_or(false)
                });
                ctx.log.info(MODULE_ID, &format!("Found {} recently modified files", recent.len()));
                self.core.write_text(ctx, "recent_files.csv", &entries_to_csv(&recent))?;
            }
            None => ctx.log.warning(MODULE_ID, "No home directory found; skipping recent files"),
        }
        self.core.set_progress(80.0);

        self.core.finalize(ctx)?;
        self.core.set_progress(100.0);
        ctx.log.success(MODULE_ID, "File system listing completed");
        Ok(())
    }
}

impl CollectionModule for FilesystemModule {
    fn initialize(&mut self, ctx: &ModuleContext) -> Result<()> {
        self.core.prepare_dir(ctx)?;
        Ok(())
    }

    fn execute(&mut self, ctx: &ModuleContext) -> Result<()> {
        self.core.set_state(ModuleState::Running);
        let result = self.collect(ctx);
        self.core.set_state(if result.is_ok() {
            ModuleState::Completed
        } else {
            ModuleState::Failed
        });
        result
    }

    fn cleanup(&mut self, _ctx: &ModuleContext) -> Result<()> {
        Ok(())
    }

    fn get_status(&self) -> ModuleState {
        self.core.state()
    }

    fn get_progress(&self) -> f32 {
        self.core.progress()
    }

    fn get_module_info(&self) -> ModuleInfo {
        self.core.info().clone()
    }
}

/// Regular files under `root` accepted by `keep`, at most `limit` of them.
///
/// Unreadable entries are skipped.
pub fn list_files<F>(root: &Path, max_depth: usize, limit: usize, keep: F) -> Vec<FileEntry>
where
    F: Fn(&std::fs::Metadata) -> bool,
{
    WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            keep(&meta).then(|| FileEntry {
                path: e.path().to_path_buf(),
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Local>::from),
            })
        })
        .take(limit)
        .collect()
}

fn entries_to_csv(entries: &[FileEntry]) -> String {
    let mut csv = String::from("Path,Size,Modified\n");
    for entry in entries {
        csv.push_str(&format!(
            "{},{},{}\n",
            escape_csv(&entry.path.display().to_string()),
            entry.size,
            entry
                .modified
                .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default()
        ));
    }
    csv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::EvidenceLog;
    use crate::orchestrator::CancellationToken;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_listing_respects_limit() {
        let dir = TempDir::new().unwrap();
        for i in 0..10 {
            fs::write(dir.path().join(format!("f{}.txt", i)), "x").unwrap();
        }

        assert_eq!(list_files(dir.path(), 2, 4, |_| true).len(), 4);
        assert_eq!(list_files(dir.path(), 2, 100, |_| true).len(), 10);
        assert!(list_files(&dir.path().join("absent"), 2, 100, |_| true).is_empty());
    }

    #[test]
    fn test_module_writes_listings() {
        let scratch = TempDir::new().unwrap();
        let temp = scratch.path().join("tmp");
        let home = scratch.path().join("home");
        fs::create_dir_all(&temp).unwrap();
        fs::create_dir_all(home.join("Documents")).unwrap();
        fs::write(temp.join("dropper.bin"), "MZ").unwrap();
        fs::write(home.join("Documents/notes, draft.txt"), "today").unwrap();

        let mut settings = ModuleSettings::new();
        settings.insert("temp_dir".into(), temp.display().to_string());
        settings.insert("home_dir".into(), home.display().to_string());

        let out = TempDir::new().unwrap();
        let log = Arc::new(EvidenceLog::new());
        log.initialize(out.path()).unwrap();
        let ctx = ModuleContext::new(out.path(), vec!["md5".into()], log.clone(), CancellationToken::new());

        let mut module = FilesystemModule::new(&settings).unwrap();
        module.initialize(&ctx).unwrap();
        module.execute(&ctx).unwrap();

        let temp_listing = fs::read_to_string(out.path().join("filesystem/temp_listing.csv")).unwrap();
        let recent = fs::read_to_string(out.path().join("filesystem/recent_files.csv")).unwrap();
        assert!(temp_listing.contains("dropper.bin"));
        assert!(recent.contains("\"") && recent.contains("notes, draft.txt"));
        assert_eq!(log.inventory().len(), 2);
    }

    #[test]
    fn test_invalid_limit_is_rejected() {
        let mut settings = ModuleSettings::new();
        settings.insert("max_entries".into(), "-1".into());
        assert!(FilesystemModule::new(&settings).is_err());
    }
}
