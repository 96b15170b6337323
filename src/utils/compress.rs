use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::constants::{
    BALANCED_COMPRESSION_THRESHOLD, COMPRESSION_CHUNK_SIZE as CHUNK_SIZE,
    COMPRESSION_PROGRESS_INTERVAL_SECS, DEFLATE_LEVEL_BALANCED, DEFLATE_LEVEL_BEST,
    DEFLATE_LEVEL_FASTEST, FASTEST_COMPRESSION_THRESHOLD,
};
use crate::error::CollectionError;

/// Entries above this size need ZIP64 headers
const ZIP64_ENTRY_THRESHOLD: u64 = u32::MAX as u64;

/// Compression effort chosen from the total package size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompressionLevel {
    Fastest,
    Balanced,
    Best,
}

impl CompressionLevel {
    /// Pick the effort for a package of `total_bytes`.
    ///
    /// Larger packages never get a stronger level than smaller ones.
    pub fn for_total_size(total_bytes: u64) -> Self {
        if total_bytes >= FASTEST_COMPRESSION_THRESHOLD {
            CompressionLevel::Fastest
        } else if total_bytes >= BALANCED_COMPRESSION_THRESHOLD {
            CompressionLevel::Balanced
        } else {
            CompressionLevel::Best
        }
    }

    pub fn deflate_level(&self) -> i32 {
        match self {
            CompressionLevel::Fastest => DEFLATE_LEVEL_FASTEST,
            CompressionLevel::Balanced => DEFLATE_LEVEL_BALANCED,
            CompressionLevel::Best => DEFLATE_LEVEL_BEST,
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionLevel::Fastest => "fastest",
            CompressionLevel::Balanced => "balanced",
            CompressionLevel::Best => "best",
        };
        write!(f, "{} (deflate {})", name, self.deflate_level())
    }
}

/// Archive container formats the compressor can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
}

impl ArchiveFormat {
    pub fn parse(name: &str) -> std::result::Result<Self, CollectionError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            other => Err(CollectionError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
        }
    }
}

/// One file scheduled for compression.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub abs_path: PathBuf,
    /// Archive name, relative to the parent of the output tree, `/`-separated
    pub archive_name: String,
    pub size: u64,
}

/// Every file of an output tree, gathered before compression starts.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
    pub total_bytes: u64,
}

impl Manifest {
    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionProgress {
    pub files_done: usize,
    pub total_files: usize,
    pub bytes_done: u64,
    pub total_bytes: u64,
    pub percent: f64,
    /// Bytes per second since the previous progress event
    pub throughput_bps: f64,
    /// Remaining time at the average throughput since the job started
    pub eta: Option<Duration>,
}

/// Result of a finished compression job.
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub archive_path: PathBuf,
    pub file_count: usize,
    pub original_size: u64,
    pub compressed_size: u64,
    pub level: CompressionLevel,
    pub elapsed: Duration,
    pub average_throughput_bps: f64,
    pub reduction_percent: f64,
}

/// Rate limiter for progress events: at most one per interval, plus the final one.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    /// Decide whether to emit at `now`; records the emission when it does.
    pub fn should_emit(&mut self, now: Instant, is_final: bool) -> bool {
        let due = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };

        if due || is_final {
            self.last_emit = Some(now);
            true
        } else {
            false
        }
    }

    pub fn last_emit(&self) -> Option<Instant> {
        self.last_emit
    }
}

/// Archive name of `path` relative to `base`, joined with `/`.
fn archive_name(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk the output tree once and record every regular file with its size.
///
/// Names are relative to the tree's parent so the archive extracts into a
/// folder named like the tree.
pub fn build_manifest(source_dir: &Path) -> Result<Manifest> {
    let base = source_dir.parent().unwrap_or(source_dir);
    let mut manifest = Manifest::default();

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry during manifest scan: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        manifest.total_bytes += size;
        manifest.entries.push(ManifestEntry {
            abs_path: entry.path().to_path_buf(),
            archive_name: archive_name(base, entry.path()),
            size,
        });
    }

    debug!(
        "Manifest for {}: {} files, {} bytes",
        source_dir.display(),
        manifest.file_count(),
        manifest.total_bytes
    );
    Ok(manifest)
}

/// Archive written next to the output tree, named after it.
pub fn archive_path_for(source_dir: &Path, format: ArchiveFormat) -> Result<PathBuf> {
    let name = source_dir
        .file_name()
        .ok_or_else(|| anyhow!("Output directory has no name: {}", source_dir.display()))?;
    let parent = source_dir.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(format!("{}.{}", name.to_string_lossy(), format.extension())))
}

/// Progress bookkeeping shared by the streaming loop
struct ProgressTracker<'a> {
    started: Instant,
    throttle: ProgressThrottle,
    bytes_at_last_emit: u64,
    total_files: usize,
    total_bytes: u64,
    callback: &'a mut dyn FnMut(&CompressionProgress),
}

impl<'a> ProgressTracker<'a> {
    fn report(&mut self, files_done: usize, bytes_done: u64, is_final: bool) {
        let now = Instant::now();
        let previous = self.throttle.last_emit().unwrap_or(self.started);
        if !self.throttle.should_emit(now, is_final) {
            return;
        }

        let window = now.saturating_duration_since(previous).as_secs_f64();
        let throughput_bps = if window > 0.0 {
            (bytes_done - self.bytes_at_last_emit) as f64 / window
        } else {
            0.0
        };
        self.bytes_at_last_emit = bytes_done;

        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        let average = if elapsed > 0.0 { bytes_done as f64 / elapsed } else { 0.0 };
        let remaining = self.total_bytes.saturating_sub(bytes_done);
        let eta = if remaining == 0 {
            Some(Duration::ZERO)
        } else if average > 0.0 {
            Some(Duration::from_secs_f64(remaining as f64 / average))
        } else {
            None
        };

        let percent = if self.total_bytes > 0 {
            bytes_done as f64 * 100.0 / self.total_bytes as f64
        } else {
            100.0
        };

        (self.callback)(&CompressionProgress {
            files_done,
            total_files: self.total_files,
            bytes_done,
            total_bytes: self.total_bytes,
            percent,
            throughput_bps,
            eta,
        });
    }
}

/// Compress a finished output tree into a single archive next to it.
///
/// Returns `Ok(None)` when the tree holds no files; nothing is written then.
pub fn compress_evidence(
    source_dir: &Path,
    format: ArchiveFormat,
    on_progress: &mut dyn FnMut(&CompressionProgress),
) -> Result<Option<ArchiveSummary>> {
    let manifest = build_manifest(source_dir)?;
    if manifest.is_empty() {
        warn!("No files to compress in {}", source_dir.display());
        return Ok(None);
    }

    write_archive(source_dir, &manifest, format, on_progress).map(Some)
}

/// Stream every manifest entry into the archive, reporting progress as it goes.
fn write_archive(
    source_dir: &Path,
    manifest: &Manifest,
    format: ArchiveFormat,
    on_progress: &mut dyn FnMut(&CompressionProgress),
) -> Result<ArchiveSummary> {
    let level = CompressionLevel::for_total_size(manifest.total_bytes);
    let archive_path = archive_path_for(source_dir, format)?;
    info!(
        "Compressing {} files ({} bytes) to {} using {} compression",
        manifest.file_count(),
        manifest.total_bytes,
        archive_path.display(),
        level
    );

    let started = Instant::now();
    let archive_file = fs::File::create(&archive_path)
        .context(format!("Failed to create archive {}", archive_path.display()))?;
    let mut zip = ZipWriter::new(archive_file);

    let mut tracker = ProgressTracker {
        started,
        throttle: ProgressThrottle::new(Duration::from_secs(COMPRESSION_PROGRESS_INTERVAL_SECS)),
        bytes_at_last_emit: 0,
        total_files: manifest.file_count(),
        total_bytes: manifest.total_bytes,
        callback: on_progress,
    };

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut bytes_done: u64 = 0;
    let mut files_done: usize = 0;

    for entry in &manifest.entries {
        // Bounded to the manifest size; the run's own log may still be growing.
        let mut file = match fs::File::open(&entry.abs_path) {
            Ok(file) => file.take(entry.size),
            Err(e) => {
                warn!("Skipping {} in archive: {}", entry.abs_path.display(), e);
                bytes_done += entry.size;
                files_done += 1;
                tracker.report(files_done, bytes_done, files_done == manifest.file_count());
                continue;
            }
        };

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level.deflate_level()))
            .large_file(entry.size >= ZIP64_ENTRY_THRESHOLD)
            .unix_permissions(0o644);

        zip.start_file(entry.archive_name.clone(), options)
            .context(format!("Failed to start archive entry {}", entry.archive_name))?;

        let mut written: u64 = 0;
        loop {
            let bytes_read = file
                .read(&mut buffer)
                .context(format!("Failed to read {}", entry.abs_path.display()))?;
            if bytes_read == 0 {
                break;
            }
            zip.write_all(&buffer[..bytes_read])
                .context(format!("Failed to write archive entry {}", entry.archive_name))?;

            written += bytes_read as u64;
            tracker.report(files_done, bytes_done + written, false);
        }

        // The manifest size is what the progress total was built from.
        bytes_done += entry.size;
        files_done += 1;
        let is_final = files_done == manifest.file_count();
        tracker.report(files_done, bytes_done, is_final);
    }

    zip.finish().context("Failed to finalize archive")?;

    let elapsed = started.elapsed();
    let compressed_size = fs::metadata(&archive_path)
        .context("Failed to stat finished archive")?
        .len();
    let secs = elapsed.as_secs_f64();
    let average_throughput_bps = if secs > 0.0 {
        manifest.total_bytes as f64 / secs
    } else {
        0.0
    };
    let reduction_percent = if manifest.total_bytes > 0 {
        (1.0 - compressed_size as f64 / manifest.total_bytes as f64) * 100.0
    } else {
        0.0
    };

    let summary = ArchiveSummary {
        archive_path,
        file_count: manifest.file_count(),
        original_size: manifest.total_bytes,
        compressed_size,
        level,
        elapsed,
        average_throughput_bps,
        reduction_percent,
    };

    info!(
        "Compressed {} files in {:.1}s ({}/s): {} -> {} ({:.1}% reduction)",
        summary.file_count,
        secs,
        format_bytes(average_throughput_bps as u64),
        format_bytes(summary.original_size),
        format_bytes(summary.compressed_size),
        summary.reduction_percent
    );

    Ok(summary)
}

/// Human-readable byte count (binary units).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Short `HH:MM:SS` rendering used for ETAs.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GIB;
    use proptest::prelude::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::read::ZipArchive;

    fn evidence_tree(root: &Path) -> PathBuf {
        let tree = root.join("Evidence_20240101_120000");
        fs::create_dir_all(tree.join("network")).unwrap();
        fs::create_dir_all(tree.join("live_system/nested")).unwrap();
        fs::write(tree.join("network/arp_cache.txt"), b"ARP Cache\n").unwrap();
        fs::write(tree.join("live_system/processes.csv"), b"PID,Name\n1,init\n").unwrap();
        fs::write(tree.join("live_system/nested/env.json"), b"{}").unwrap();
        tree
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(CompressionLevel::for_total_size(0), CompressionLevel::Best);
        assert_eq!(CompressionLevel::for_total_size(5 * GIB - 1), CompressionLevel::Best);
        assert_eq!(CompressionLevel::for_total_size(5 * GIB), CompressionLevel::Balanced);
        assert_eq!(CompressionLevel::for_total_size(10 * GIB - 1), CompressionLevel::Balanced);
        assert_eq!(CompressionLevel::for_total_size(10 * GIB), CompressionLevel::Fastest);
        assert_eq!(CompressionLevel::for_total_size(u64::MAX), CompressionLevel::Fastest);
    }

    proptest! {
        #[test]
        fn prop_level_is_monotonic(a in any::<u64>(), b in any::<u64>()) {
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            let small_level = CompressionLevel::for_total_size(small);
            let large_level = CompressionLevel::for_total_size(large);
            prop_assert!(large_level.deflate_level() <= small_level.deflate_level());
        }
    }

    #[test]
    fn test_archive_format_parse() {
        assert_eq!(ArchiveFormat::parse("ZIP").unwrap(), ArchiveFormat::Zip);
        assert!(matches!(
            ArchiveFormat::parse("7z"),
            Err(CollectionError::UnsupportedFormat(f)) if f == "7z"
        ));
    }

    #[test]
    fn test_manifest_is_relative_to_parent() {
        let temp = TempDir::new().unwrap();
        let tree = evidence_tree(temp.path());

        let manifest = build_manifest(&tree).unwrap();
        let names: Vec<&str> = manifest.entries.iter().map(|e| e.archive_name.as_str()).collect();

        assert_eq!(manifest.file_count(), 3);
        assert!(names.contains(&"Evidence_20240101_120000/network/arp_cache.txt"));
        assert!(names.contains(&"Evidence_20240101_120000/live_system/nested/env.json"));
        assert_eq!(manifest.total_bytes, 10 + 16 + 2);
    }

    #[test]
    fn test_compress_evidence_round_trip() {
        let temp = TempDir::new().unwrap();
        let tree = evidence_tree(temp.path());

        let mut events = Vec::new();
        let summary = compress_evidence(&tree, ArchiveFormat::Zip, &mut |p: &CompressionProgress| events.push(p.clone()))
            .unwrap()
            .expect("archive should be produced");

        assert_eq!(summary.archive_path, temp.path().join("Evidence_20240101_120000.zip"));
        assert_eq!(summary.file_count, 3);
        assert_eq!(summary.level, CompressionLevel::Best);

        let last = events.last().expect("final progress event");
        assert_eq!(last.files_done, 3);
        assert_eq!(last.bytes_done, last.total_bytes);
        assert!((last.percent - 100.0).abs() < f64::EPSILON);

        let mut archive = ZipArchive::new(fs::File::open(&summary.archive_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
        let mut content = String::new();
        archive
            .by_name("Evidence_20240101_120000/network/arp_cache.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "ARP Cache\n");
    }

    #[test]
    fn test_vanished_last_file_still_reports_completion() {
        let temp = TempDir::new().unwrap();
        let tree = evidence_tree(temp.path());
        let manifest = build_manifest(&tree).unwrap();
        let last = manifest.entries.last().unwrap();
        fs::remove_file(&last.abs_path).unwrap();

        let mut events = Vec::new();
        let summary = write_archive(&tree, &manifest, ArchiveFormat::Zip, &mut |p: &CompressionProgress| {
            events.push(p.clone())
        })
        .unwrap();

        let final_event = events.last().expect("final progress event");
        assert_eq!(final_event.files_done, 3);
        assert_eq!(final_event.bytes_done, manifest.total_bytes);
        assert!((final_event.percent - 100.0).abs() < f64::EPSILON);

        let archive = ZipArchive::new(fs::File::open(&summary.archive_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn test_empty_tree_produces_no_archive() {
        let temp = TempDir::new().unwrap();
        let tree = temp.path().join("Evidence_empty");
        fs::create_dir_all(tree.join("network")).unwrap();

        let mut calls = 0;
        let result = compress_evidence(&tree, ArchiveFormat::Zip, &mut |_: &CompressionProgress| calls += 1).unwrap();

        assert!(result.is_none());
        assert_eq!(calls, 0);
        assert!(!temp.path().join("Evidence_empty.zip").exists());
    }

    #[test]
    fn test_throttle_limits_rate() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(1));
        let t0 = Instant::now();

        assert!(throttle.should_emit(t0, false));
        assert!(!throttle.should_emit(t0 + Duration::from_millis(300), false));
        assert!(!throttle.should_emit(t0 + Duration::from_millis(900), false));
        assert!(throttle.should_emit(t0 + Duration::from_millis(1000), false));
        assert!(throttle.should_emit(t0 + Duration::from_millis(1100), true));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * GIB), "5.00 GB");
        assert_eq!(format_duration(Duration::from_secs(3725)), "01:02:05");
    }
}
