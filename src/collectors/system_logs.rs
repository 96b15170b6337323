//! Copies of the operating system's log files. Needs elevation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::artifacts::ModuleCore;
use super::collector::{CollectionModule, ModuleContext};
use crate::config::ModuleSettings;
use crate::models::{ModuleInfo, ModuleState};
use crate::privileges;

pub const MODULE_ID: &str = "system_logs";

#[cfg(target_os = "linux")]
const DEFAULT_LOG_SOURCES: &[&str] = &[
    "/var/log/syslog",
    "/var/log/auth.log",
    "/var/log/messages",
    "/var/log/secure",
    "/var/log/kern.log",
    "/var/log/wtmp",
    "/var/log/btmp",
];

#[cfg(target_os = "macos")]
const DEFAULT_LOG_SOURCES: &[&str] = &["/var/log/system.log", "/var/log/install.log", "/var/log/wifi.log"];

#[cfg(target_os = "windows")]
const DEFAULT_LOG_SOURCES: &[&str] = &[
    "C:\\Windows\\System32\\winevt\\Logs\\System.evtx",
    "C:\\Windows\\System32\\winevt\\Logs\\Security.evtx",
    "C:\\Windows\\System32\\winevt\\Logs\\Application.evtx",
];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const DEFAULT_LOG_SOURCES: &[&str] = &[];

pub struct SystemLogsModule {
    core: ModuleCore,
    sources: Vec<PathBuf>,
    /// Check elevation in `initialize` unless `require_elevation: "false"`
    require_elevation: bool,
}

impl SystemLogsModule {
    /// Settings: `sources` (comma separated paths) and `require_elevation`.
    pub fn new(settings: &ModuleSettings) -> Result<Self> {
        let sources = match settings.get("sources") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect(),
            None => DEFAULT_LOG_SOURCES.iter().map(PathBuf::from).collect(),
        };

        let require_elevation = match settings.get("require_elevation").map(|v| v.trim()) {
            None => true,
            Some(v) => v
                .parse::<bool>()
                .map_err(|_| anyhow!("Invalid require_elevation value: {}", v))?,
        };

        Ok(Self {
            core: ModuleCore::new(Self::info()),
            sources,
            require_elevation,
        })
    }

    pub fn info() -> ModuleInfo {
        ModuleInfo::new(
            MODULE_ID,
            "System Logs",
            env!("CARGO_PKG_VERSION"),
            "Copies of operating system log files (requires elevation)",
        )
    }

    fn collect(&mut self, ctx: &ModuleContext) -> Result<()> {
        let dir = ctx.module_dir(MODULE_ID);
        let total = self.sources.len().max(1);
        let mut copied = 0;

        for (i, source) in self.sources.iter().enumerate() {
            if !source.exists() {
                ctx.log.debug(MODULE_ID, &format!("Not present: {}", source.display()));
            } else {
                match copy_log(source, &dir) {
                    Ok(dest) => {
                        ctx.log.info(MODULE_ID, &format!("Copied {}", source.display()));
                        self.core.track(dest);
                        copied += 1;
                    }
                    Err(e) => ctx.log.warning(MODULE_ID, &format!("{:#}", e)),
                }
            }
            self.core.set_progress(80.0 * (i + 1) as f32 / total as f32);
        }

        if copied == 0 {
            return Err(anyhow!("None of the {} log sources could be copied", self.sources.len()));
        }

        self.core.finalize(ctx)?;
        self.core.set_progress(100.0);
        ctx.log.success(MODULE_ID, &format!("Copied {} log file(s)", copied));
        Ok(())
    }
}

/// Copy `source` into `dest_dir`, keeping the file name unique.
fn copy_log(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| anyhow!("Log source has no file name: {}", source.display()))?;

    let mut dest = dest_dir.join(name);
    let mut counter = 1;
    while dest.exists() {
        dest = dest_dir.join(format!("{}_{}", name.to_string_lossy(), counter));
        counter += 1;
    }

    fs::copy(source, &dest).context(format!("Failed to copy {}", source.display()))?;
    Ok(dest)
}

impl CollectionModule for SystemLogsModule {
    fn initialize(&mut self, ctx: &ModuleContext) -> Result<()> {
        if self.require_elevation {
            let check = privileges::check_required_privileges(MODULE_ID);
            if !check.allowed {
                return Err(anyhow!(check
                    .reason
                    .unwrap_or_else(|| "Insufficient privileges".to_string())));
            }
        }

        if self.sources.is_empty() {
            return Err(anyhow!("No log sources are known for this platform"));
        }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_context;
    use tempfile::TempDir;

    #[test]
    fn test_copies_configured_sources() {
        let logs = TempDir::new().unwrap();
        fs::write(logs.path().join("auth.log"), "sshd: accepted").unwrap();
        fs::create_dir_all(logs.path().join("other")).unwrap();
        fs::write(logs.path().join("other/auth.log"), "second").unwrap();

        let mut settings = ModuleSettings::new();
        settings.insert(
            "sources".into(),
            format!(
                "{}, {}, {}",
                logs.path().join("auth.log").display(),
                logs.path().join("other/auth.log").display(),
                logs.path().join("missing.log").display()
            ),
        );
        settings.insert("require_elevation".into(), "false".into());

        let out = TempDir::new().unwrap();
        let ctx = test_context(out.path(), &["sha1"]);
        let mut module = SystemLogsModule::new(&settings).unwrap();
        module.initialize(&ctx).unwrap();
        module.execute(&ctx).unwrap();

        assert!(out.path().join("system_logs/auth.log").exists());
        assert!(out.path().join("system_logs/auth.log_1").exists());
        assert_eq!(ctx.log.inventory().len(), 2);
    }

    #[test]
    fn test_fails_when_nothing_copied() {
        let mut settings = ModuleSettings::new();
        settings.insert("sources".into(), "/nonexistent/evidence.log".into());
        settings.insert("require_elevation".into(), "false".into());

        let out = TempDir::new().unwrap();
        let ctx = test_context(out.path(), &["sha1"]);
        let mut module = SystemLogsModule::new(&settings).unwrap();
        module.initialize(&ctx).unwrap();

        assert!(module.execute(&ctx).is_err());
        assert_eq!(module.get_status(), ModuleState::Failed);
    }

    #[test]
    fn test_initialize_checks_elevation() {
        let out = TempDir::new().unwrap();
        let ctx = test_context(out.path(), &["sha1"]);
        let mut module = SystemLogsModule::new(&ModuleSettings::new()).unwrap();

        let result = module.initialize(&ctx);
        if privileges::is_elevated() {
            assert!(result.is_ok() || DEFAULT_LOG_SOURCES.is_empty());
        } else {
            let message = result.unwrap_err().to_string();
            assert!(message.contains("requires elevated privileges"));
        }
    }
}
