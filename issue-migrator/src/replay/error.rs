//! Error types for the quarantine store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing or reading quarantined issues.
#[derive(Debug, Error)]
pub enum QuarantineError {
    /// A record for this issue is already on disk.
    #[error("Quarantine record already exists: {}", path.display())]
    AlreadyExists {
        /// Existing record.
        path: PathBuf,
    },

    /// Filesystem access failed.
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The record could not be encoded or decoded.
    #[error("Invalid quarantine record {}: {source}", path.display())]
    Json {
        /// Record path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}
