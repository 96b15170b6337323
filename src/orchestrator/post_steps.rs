//! Steps that run after the module loop. Their failures are logged and
//! never change the outcome of the run.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use anyhow::{anyhow, Result};

use super::events::RunCallbacks;
use crate::config::CollectionConfig;
use crate::logging::EvidenceLog;
use crate::models::RunSummary;
use crate::utils::compress::{
    compress_evidence, format_bytes, format_duration, ArchiveFormat, ArchiveSummary, CompressionProgress,
};
use crate::utils::hash::hash_file;
use crate::utils::report::generate_report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStep {
    Report,
    Verify,
    Compress,
}

impl fmt::Display for PostStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PostStep::Report => "Report generation",
            PostStep::Verify => "Integrity verification",
            PostStep::Compress => "Compression",
        };
        f.write_str(name)
    }
}

/// Steps enabled by `config`, in execution order.
pub fn planned_steps(config: &CollectionConfig) -> Vec<PostStep> {
    let mut steps = Vec::new();
    if config.report.enabled {
        steps.push(PostStep::Report);
    }
    if config.hashing.verify_after_collection {
        steps.push(PostStep::Verify);
    }
    if config.compression.enabled {
        steps.push(PostStep::Compress);
    }
    steps
}

/// Turn a panic payload into a readable message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `f`, catching both errors and panics. Failures become ERROR events.
pub fn run_best_effort<T>(step: PostStep, log: &EvidenceLog, f: impl FnOnce() -> Result<T>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            log.error("", &format!("{} failed: {:#}", step, e));
            None
        }
        Err(payload) => {
            log.error("", &format!("{} panicked: {}", step, panic_message(payload.as_ref())));
            None
        }
    }
}

pub fn report_step(output_dir: &Path, summary: &RunSummary, log: &EvidenceLog) -> Result<()> {
    let (html, _json) = generate_report(output_dir, summary, &log.inventory())?;
    log.info("", &format!("Report generated: {}", html.display()));
    Ok(())
}

/// Re-hash every inventoried file and compare with the ledgered digests.
///
/// Returns the number of files checked.
pub fn verify_step(log: &EvidenceLog) -> Result<usize> {
    let inventory = log.inventory();
    let mut checked = 0;
    let mut mismatches = Vec::new();

    for record in inventory.iter().filter(|r| !r.digests.is_empty()) {
        checked += 1;
        // One read per file, whatever the number of recorded digests.
        let algorithms: Vec<&str> = record.digests.keys().map(String::as_str).collect();
        let actual = hash_file(&record.path, &algorithms);
        let intact = record.digests.iter().all(|(algorithm, expected)| {
            actual
                .get(&algorithm.to_lowercase())
                .map(|digest| digest.eq_ignore_ascii_case(expected))
                .unwrap_or(false)
        });
        if !intact {
            log.error(
                &record.module,
                &format!("Integrity check failed for {}", record.path.display()),
            );
            mismatches.push(record.path.display().to_string());
        }
    }

    if !mismatches.is_empty() {
        return Err(anyhow!("{} of {} file(s) changed after hashing", mismatches.len(), checked));
    }

    log.success("", &format!("Integrity verified for {} file(s)", checked));
    Ok(checked)
}

pub fn compress_step(
    output_dir: &Path,
    format: &str,
    log: &EvidenceLog,
    callbacks: &RunCallbacks,
) -> Result<Option<ArchiveSummary>> {
    let format = ArchiveFormat::parse(format)?;
    log.info("", &format!("Compressing {}", output_dir.display()));
    // Logs go into the archive, so everything written so far must be on disk.
    log.flush();

    let summary = compress_evidence(output_dir, format, &mut |progress: &CompressionProgress| {
        callbacks.compression_progress(progress);
        log.debug(
            "",
            &format!(
                "Compressing: {:.1}% ({}/{} files, {}/s, ETA {})",
                progress.percent,
                progress.files_done,
                progress.total_files,
                format_bytes(progress.throughput_bps as u64),
                progress
                    .eta
                    .map(format_duration)
                    .unwrap_or_else(|| "unknown".to_string())
            ),
        );
    })?;

    match &summary {
        Some(archive) => log.success(
            "",
            &format!(
                "Archive created: {} ({} -> {}, {:.1}% reduction, {:.1}s, {}/s)",
                archive.archive_path.display(),
                format_bytes(archive.original_size),
                format_bytes(archive.compressed_size),
                archive.reduction_percent,
                archive.elapsed.as_secs_f64(),
                format_bytes(archive.average_throughput_bps as u64)
            ),
        ),
        None => log.warning("", "Nothing to compress; no archive created"),
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileHashRecord;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_planned_steps_follow_config() {
        let mut config = CollectionConfig::default();
        assert_eq!(
            planned_steps(&config),
            vec![PostStep::Report, PostStep::Verify, PostStep::Compress]
        );

        config.report.enabled = false;
        config.compression.enabled = false;
        assert_eq!(planned_steps(&config), vec![PostStep::Verify]);
    }

    #[test]
    fn test_best_effort_swallows_errors_and_panics() {
        let log = EvidenceLog::new();

        assert_eq!(run_best_effort(PostStep::Report, &log, || Ok(7)), Some(7));
        assert_eq!(
            run_best_effort::<()>(PostStep::Report, &log, || Err(anyhow!("disk full"))),
            None
        );
        assert_eq!(
            run_best_effort::<()>(PostStep::Compress, &log, || panic!("zip writer exploded")),
            None
        );
    }

    #[test]
    fn test_verify_detects_modified_file() {
        let dir = TempDir::new().unwrap();
        let log = EvidenceLog::new();
        log.initialize(dir.path()).unwrap();

        let path = dir.path().join("artifact.txt");
        fs::write(&path, "original").unwrap();
        log.record_artifact(FileHashRecord {
            module: "m".into(),
            path: path.clone(),
            size: 8,
            digests: hash_file(&path, &["sha256"]),
        });

        assert_eq!(verify_step(&log).unwrap(), 1);

        fs::write(&path, "tampered").unwrap();
        assert!(verify_step(&log).is_err());
    }

    #[test]
    fn test_verify_checks_every_recorded_digest() {
        let dir = TempDir::new().unwrap();
        let log = EvidenceLog::new();
        log.initialize(dir.path()).unwrap();

        let path = dir.path().join("hello.txt");
        fs::write(&path, "hello").unwrap();
        let mut digests = hash_file(&path, &["md5", "sha1", "sha256"]);
        for digest in digests.values_mut() {
            *digest = digest.to_uppercase();
        }
        log.record_artifact(FileHashRecord {
            module: "m".into(),
            path: path.clone(),
            size: 5,
            digests: digests.clone(),
        });
        assert_eq!(verify_step(&log).unwrap(), 1);

        digests.insert("sha1".into(), "0".repeat(40));
        log.record_artifact(FileHashRecord {
            module: "m".into(),
            path: path.clone(),
            size: 5,
            digests,
        });
        let err = verify_step(&log).unwrap_err();
        assert!(err.to_string().contains("1 of 2 file(s) changed after hashing"));
    }

    #[test]
    fn test_unsupported_format_fails_the_step() {
        let dir = TempDir::new().unwrap();
        let log = EvidenceLog::new();
        let err = compress_step(dir.path(), "rar", &log, &RunCallbacks::new()).unwrap_err();
        assert!(err.to_string().contains("Unsupported compression format: rar"));
    }
}
