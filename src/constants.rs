//! Global constants for the evidence collector.
//!
//! This module centralizes hardcoded values so that tuning a chunk size or a
//! compression threshold happens in one place.

// Buffer and chunk sizes
/// Chunk size used by the hash engine when streaming a file (8KB)
pub const HASH_CHUNK_SIZE: usize = 8 * 1024;

/// Chunk size for compression reads (512KB)
pub const COMPRESSION_CHUNK_SIZE: usize = 512 * 1024;

// Compression level thresholds
/// One gibibyte
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Packages at or above this size use the fastest deflate level (10GB)
pub const FASTEST_COMPRESSION_THRESHOLD: u64 = 10 * GIB;

/// Packages at or above this size use the balanced deflate level (5GB)
pub const BALANCED_COMPRESSION_THRESHOLD: u64 = 5 * GIB;

/// Deflate level used for very large packages
pub const DEFLATE_LEVEL_FASTEST: i32 = 1;

/// Deflate level used for mid-sized packages
pub const DEFLATE_LEVEL_BALANCED: i32 = 6;

/// Deflate level used for everything else
pub const DEFLATE_LEVEL_BEST: i32 = 9;

// Timing
/// Minimum interval between two compression progress events in seconds
pub const COMPRESSION_PROGRESS_INTERVAL_SECS: u64 = 1;

/// Extra time granted to a timed capture job past its nominal duration
pub const CAPTURE_JOIN_GRACE_SECS: u64 = 5;

/// Sampling interval of the traffic capture job in milliseconds
pub const CAPTURE_SAMPLE_INTERVAL_MS: u64 = 1000;

// Hashing
/// Algorithms the hash engine knows how to compute
pub const SUPPORTED_HASH_ALGORITHMS: &[&str] = &["md5", "sha1", "sha256"];

/// Algorithms used when the configuration names none
pub const DEFAULT_HASH_ALGORITHMS: &[&str] = &["md5", "sha256"];

// Modules
/// Run order used when no modules are requested explicitly
pub const DEFAULT_MODULES: &[&str] = &["live_system", "network", "filesystem", "system_logs"];

// Default file names
pub const REPORT_HTML_NAME: &str = "collection_report.html";
pub const REPORT_JSON_NAME: &str = "collection_summary.json";
pub const MODULE_HASHES_NAME: &str = "hashes.txt";
pub const DEFAULT_PACKAGE_NAMING: &str = "Evidence_{timestamp}";
pub const DEFAULT_COMPRESSION_FORMAT: &str = "zip";

// Terminal messages
pub const MSG_COLLECTION_SUCCESS: &str = "Collection completed successfully!";
pub const MSG_STOPPED_BY_USER: &str = "Stopped by user";
