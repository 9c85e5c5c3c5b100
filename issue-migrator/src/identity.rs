//! Destination user lookups with a per-run cache.

use crate::clients::{ClientError, DestinationTracker, DestinationUser};
use std::collections::HashMap;
use tracing::debug;

/// Resolves usernames to destination users, remembering every hit.
///
/// One resolver lives for one run. Only unambiguous hits are cached, so a
/// miss is always retried against the destination on the next call.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    cache: HashMap<String, DestinationUser>,
}

impl IdentityResolver {
    /// Creates a resolver with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks `username` up, consulting the cache before the destination.
    ///
    /// Returns `None` when the destination knows no such user or reports
    /// more than one match.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] of a failed user search. Nothing is cached.
    pub async fn resolve(
        &mut self,
        destination: &dyn DestinationTracker,
        username: &str,
    ) -> Result<Option<DestinationUser>, ClientError> {
        if let Some(user) = self.cache.get(username) {
            return Ok(Some(user.clone()));
        }

        let mut users = destination.search_users(username).await?;
        match users.len() {
            0 => {
                debug!(username, "No destination user found");
                Ok(None)
            }
            1 => {
                let user = users.remove(0);
                self.cache.insert(username.to_string(), user.clone());
                Ok(Some(user))
            }
            count => {
                debug!(username, count, "Ambiguous destination user, ignoring");
                Ok(None)
            }
        }
    }

    /// Records a user that is known to exist, e.g. one just created.
    pub fn remember(&mut self, user: DestinationUser) {
        self.cache.insert(user.username.clone(), user);
    }

    /// Number of cached users.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if nothing has been cached yet.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
