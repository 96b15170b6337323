//! Shared bookkeeping for built-in modules: state, output folder,
//! produced files and the final hashing pass.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use super::collector::ModuleContext;
use crate::constants::MODULE_HASHES_NAME;
use crate::models::{FileHashRecord, ModuleInfo, ModuleState};
use crate::utils::hash::hash_file;

/// State and produced files of one module instance.
#[derive(Debug)]
pub struct ModuleCore {
    info: ModuleInfo,
    state: ModuleState,
    progress: f32,
    files: Vec<PathBuf>,
}

impl ModuleCore {
    pub fn new(info: ModuleInfo) -> Self {
        Self {
            info,
            state: ModuleState::Initialized,
            progress: 0.0,
            files: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn set_state(&mut self, state: ModuleState) {
        self.state = state;
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn set_progress(&mut self, percent: f32) {
        self.progress = percent.clamp(0.0, 100.0);
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Create the module's folder under the run root.
    pub fn prepare_dir(&self, ctx: &ModuleContext) -> Result<PathBuf> {
        let dir = ctx.module_dir(self.id());
        fs::create_dir_all(&dir)
            .context(format!("Failed to create module directory: {}", dir.display()))?;
        Ok(dir)
    }

    /// Write a text artifact into the module folder and track it.
    pub fn write_text(&mut self, ctx: &ModuleContext, name: &str, content: &str) -> Result<PathBuf> {
        let path = ctx.module_dir(self.id()).join(name);
        fs::write(&path, content).context(format!("Failed to write {}", path.display()))?;
        debug!("Saved data to {}", path.display());
        self.files.push(path.clone());
        Ok(path)
    }

    /// Serialize `data` as pretty JSON into the module folder and track it.
    pub fn write_json<T: serde::Serialize>(
        &mut self,
        ctx: &ModuleContext,
        name: &str,
        data: &T,
    ) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(data).context("Failed to serialize data to JSON")?;
        self.write_text(ctx, name, &json)
    }

    /// Track a file the module wrote by other means (copies, tool output).
    pub fn track(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    /// Hash every tracked file, ledger each one and write `hashes.txt`.
    ///
    /// Runs after the module finished writing, so digests match final content.
    pub fn finalize(&mut self, ctx: &ModuleContext) -> Result<Vec<FileHashRecord>> {
        let records = hash_artifacts(ctx, self.id(), &self.files);
        write_hash_summary(&ctx.module_dir(self.id()), &records)?;
        ctx.log.info(
            self.id(),
            &format!("Hashed {} collected file(s)", records.len()),
        );
        Ok(records)
    }
}

/// Hash `files` with the run's algorithms and ledger each result.
pub fn hash_artifacts(ctx: &ModuleContext, module_id: &str, files: &[PathBuf]) -> Vec<FileHashRecord> {
    let mut records = Vec::with_capacity(files.len());

    for path in files {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let digests = hash_file(path, &ctx.algorithms);
        if digests.is_empty() && !ctx.algorithms.is_empty() {
            ctx.log.warning(module_id, &format!("Could not hash {}", path.display()));
        }

        let record = FileHashRecord {
            module: module_id.to_string(),
            path: path.clone(),
            size,
            digests,
        };
        ctx.log.record_artifact(record.clone());
        records.push(record);
    }

    records
}

/// `hashes.txt`: one block per file, one `algorithm: digest` line each.
pub fn write_hash_summary(module_dir: &Path, records: &[FileHashRecord]) -> Result<PathBuf> {
    let mut content = String::new();
    for record in records {
        let name = record
            .path
            .strip_prefix(module_dir)
            .unwrap_or(&record.path)
            .display()
            .to_string();
        let _ = writeln!(content, "{} ({} bytes)", name, record.size);
        for (algorithm, digest) in &record.digests {
            let _ = writeln!(content, "  {}: {}", algorithm, digest);
        }
    }

    let path = module_dir.join(MODULE_HASHES_NAME);
    fs::write(&path, content).context(format!("Failed to write {}", path.display()))?;
    Ok(path)
}
