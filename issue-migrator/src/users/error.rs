//! User provisioning error types.

use crate::clients::ClientError;
use thiserror::Error;

/// Errors that stop user provisioning, and with it the whole run.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The source tracker could not be asked about a user.
    #[error("Failed to look up source user '{username}': {source}")]
    SourceLookup {
        username: String,
        #[source]
        source: ClientError,
    },

    /// The destination tracker could not be searched for a user.
    #[error("Failed to look up destination user '{username}': {source}")]
    DestinationLookup {
        username: String,
        #[source]
        source: ClientError,
    },

    /// Creating the destination user failed.
    #[error("Failed to create destination user '{username}': {source}")]
    Creation {
        username: String,
        #[source]
        source: ClientError,
    },

    /// Adding the user to the destination project failed.
    #[error("Failed to add user '{username}' to project {project_id}: {source}")]
    Membership {
        username: String,
        project_id: u64,
        #[source]
        source: ClientError,
    },
}
