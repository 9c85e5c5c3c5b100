//! Snapshot error types.

use crate::clients::ClientError;
use thiserror::Error;

/// Errors that abort snapshot construction.
///
/// Failures scoped to a single issue or attachment are counted instead.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A search page could not be fetched; no partial snapshot is usable.
    #[error("Failed to search issues of project '{project}' at offset {start_at}: {source}")]
    Search {
        project: String,
        start_at: usize,
        #[source]
        source: ClientError,
    },

    /// The staging directory for attachments could not be created.
    #[error("Failed to prepare staging directory '{path}': {source}")]
    Staging {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
