//! Authorship identities.

/// Source administrator account name.
pub const SOURCE_ADMIN: &str = "admin";

/// Destination administrator account name. Always exists, never created.
pub const DESTINATION_ADMIN: &str = "root";

/// Maps a source username onto the name it has in the destination.
///
/// Only the administrator account is renamed.
#[must_use]
pub fn map_source_username(username: &str) -> String {
    if username == SOURCE_ADMIN {
        DESTINATION_ADMIN.to_string()
    } else {
        username.to_string()
    }
}

/// A person referenced by the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// Username shared by both trackers (after the admin mapping).
    pub username: String,

    /// Email address reported by the source tracker.
    pub email: String,

    /// Display name reported by the source tracker.
    pub display_name: String,

    /// Destination user id once the user exists there.
    pub destination_id: Option<u64>,
}
