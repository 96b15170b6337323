//! Engine-level error types.
//!
//! Module implementations and post-steps report failures through
//! `anyhow::Result`; the variants here are the ones callers of the
//! orchestrator branch on.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("A collection run is already in progress")]
    AlreadyRunning,

    #[error("No modules could be loaded from the requested identifiers")]
    NoModulesResolved,

    #[error("Failed to create output directory: {path}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open evidence log: {0}")]
    LogInitialization(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Failed to create module {id}: {reason}")]
    ModuleConstruction { id: String, reason: String },

    #[error("Unsupported compression format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to start collection worker")]
    WorkerSpawn(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CollectionError::UnknownModule("memory".into()).to_string(),
            "Unknown module: memory"
        );
        assert_eq!(
            CollectionError::UnsupportedFormat("7z".into()).to_string(),
            "Unsupported compression format: 7z"
        );
    }

    #[test]
    fn test_output_directory_error_keeps_source() {
        let err = CollectionError::OutputDirectory {
            path: PathBuf::from("/nonexistent/out"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/nonexistent/out"));
    }
}
