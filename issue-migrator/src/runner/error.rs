//! Runner error types.

use crate::clients::ClientError;
use crate::config::ConfigError;
use crate::snapshot::SnapshotError;
use crate::users::ProvisioningError;

/// Errors that abort a migration run before or during user provisioning.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Settings loading or validation errors.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A tracker client could not be constructed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The source project could not be read or staged.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// More than one destination project carries the requested name.
    #[error("Found {count} destination projects named '{name}', refusing to guess")]
    AmbiguousProject { name: String, count: usize },

    /// The destination project could not be searched for or created.
    #[error("Failed to resolve destination project '{name}': {source}")]
    ProjectResolution {
        name: String,
        #[source]
        source: ClientError,
    },

    /// A user could not be provisioned.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
}

impl RunnerError {
    /// Process exit code reported for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Client(_) => 2,
            Self::Snapshot(SnapshotError::Search { .. }) => 3,
            Self::Snapshot(SnapshotError::Staging { .. }) => 7,
            Self::AmbiguousProject { .. } => 4,
            Self::ProjectResolution { .. } => 5,
            Self::Provisioning(_) => 6,
        }
    }
}
