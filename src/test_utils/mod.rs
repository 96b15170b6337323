//! Test utilities shared by unit tests.

#![cfg(test)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use crate::collectors::ModuleContext;
use crate::logging::EvidenceLog;
use crate::orchestrator::CancellationToken;

/// Module context over a freshly initialized evidence log rooted at `root`.
pub fn test_context(root: &Path, algorithms: &[&str]) -> ModuleContext {
    let log = Arc::new(EvidenceLog::new());
    log.initialize(root).expect("evidence log should open in a temp dir");
    ModuleContext::new(
        root,
        algorithms.iter().map(|a| a.to_string()).collect(),
        log,
        CancellationToken::new(),
    )
}

/// Small output tree shaped like a finished run: two module directories
/// with nested files.
pub fn create_evidence_tree() -> Result<TempDir> {
    let temp_dir = TempDir::new()?;
    let base = temp_dir.path();

    fs::create_dir_all(base.join("live_system"))?;
    fs::create_dir_all(base.join("network/raw"))?;

    fs::write(base.join("live_system/system_info.json"), br#"{"hostname":"ws-01"}"#)?;
    fs::write(base.join("live_system/processes.csv"), b"pid,name\n1,init\n")?;
    fs::write(base.join("network/interfaces.json"), b"[]")?;
    fs::write(base.join("network/raw/arp_cache.txt"), b"? (10.0.0.1) at aa:bb:cc:dd:ee:ff")?;

    Ok(temp_dir)
}
