//! Utilities shared by modules and post-steps.
//!
//! - **Hashing**: streaming multi-algorithm digests
//! - **Compression**: size-adaptive ZIP packaging of a finished run
//! - **Report**: HTML report and JSON summary of a run
//!
//! ```no_run
//! use evidence_collector::utils::hash::hash_file;
//! use std::path::Path;
//!
//! let digests = hash_file(Path::new("/evidence/memory.raw"), &["md5", "sha256"]);
//! for (algorithm, hex) in &digests {
//!     println!("{}: {}", algorithm, hex);
//! }
//! ```

/// Cryptographic hash calculation
pub mod hash;

/// ZIP archive creation with progress telemetry
pub mod compress;

/// Collection report and summary generation
pub mod report;
