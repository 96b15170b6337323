//! # evidence-collector
//!
//! A live-response evidence collection engine with chain-of-custody hashing.
//!
//! ## Overview
//!
//! A collection run executes a list of independent modules (live system
//! state, network state, file system listings, OS logs) one after another on
//! a dedicated worker thread. Every file a module produces is hashed once its
//! writes are complete and recorded in a CSV ledger next to a human-readable
//! log. Once all modules ran, the run writes a report, re-verifies the
//! recorded digests and packs the output tree into a ZIP archive whose
//! compression level adapts to the package size.
//!
//! ## Features
//!
//! - **At most one run** per orchestrator, with cooperative cancellation
//! - **Partial collection**: a failing module never aborts the run
//! - **Streaming hashing**: MD5, SHA-1 and SHA-256 in a single pass
//! - **Size-adaptive compression** with throughput and ETA telemetry
//! - **Run-scoped evidence log**: human log plus CSV ledger per run
//!
//! ## Usage
//!
//! ```no_run
//! use evidence_collector::config::CollectionConfig;
//! use evidence_collector::orchestrator::{CollectionRequest, Orchestrator, RunCallbacks};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = CollectionConfig::default();
//! let request = CollectionRequest::new(
//!     vec!["live_system".into(), "filesystem".into()],
//!     config.run_directory(),
//!     config.clone(),
//! );
//!
//! let orchestrator = Orchestrator::new();
//! orchestrator.start(request, RunCallbacks::new())?;
//! if let Some(outcome) = orchestrator.wait() {
//!     println!("{}", outcome.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`orchestrator`]: run lifecycle, module loop and post-steps
//! - [`collectors`]: module contract, registry and built-in modules
//! - [`logging`]: run-scoped evidence log and ledger
//! - [`utils`]: hashing, compression and reporting
//! - [`config`]: YAML configuration
//! - [`privileges`]: elevation checks
//!
//! ## Safety
//!
//! `unsafe` is limited to the platform calls that query elevation
//! (`geteuid`, `IsUserAnAdmin`).

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models and structures used throughout the application
pub mod models;

/// Engine error types
pub mod error;

/// Collection modules and their registry
pub mod collectors;

/// Run orchestration
pub mod orchestrator;

/// Run-scoped evidence log and chain-of-custody ledger
pub mod logging;

/// Utility functions for hashing, compression and reporting
pub mod utils;

/// Configuration management
pub mod config;

/// Platform-specific privilege checks
pub mod privileges;

/// Application constants and configuration values
pub mod constants;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
