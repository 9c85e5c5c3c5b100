//! Creation of destination accounts for every author in a snapshot.
//!
//! Impersonated writes need the author to exist in the destination and to be
//! able to write to the project, so every author is created (as an
//! administrator, which is what allows impersonation) and made a maintainer
//! before the first issue is replayed.

mod error;

pub use error::ProvisioningError;

use crate::clients::{AccessLevel, DestinationTracker, DestinationUser, NewUser, SourceTracker};
use crate::identity::IdentityResolver;
use crate::project::{Project, UserIdentity, DESTINATION_ADMIN};
use tracing::{debug, info, info_span, warn, Instrument};

/// Membership granted to every provisioned user.
pub const PROVISIONED_ACCESS: AccessLevel = AccessLevel::Maintainer;

/// Outcome of provisioning the authors of a project.
#[derive(Debug, Clone, Default)]
pub struct ProvisioningReport {
    /// Users that exist in the destination and belong to the project.
    pub users: Vec<UserIdentity>,

    /// Usernames the source tracker could not describe. Writes attributed
    /// to them fall back to the administrator.
    pub unresolved: Vec<String>,
}

/// Returns true for usernames that are never created or looked up.
///
/// The empty name stands for an anonymous author and the administrator
/// always exists.
#[must_use]
pub fn is_reserved(username: &str) -> bool {
    username.is_empty() || username == DESTINATION_ADMIN
}

/// Ensures every author of `project` exists in the destination and is a
/// maintainer of `project_id`.
///
/// # Errors
///
/// Returns [`ProvisioningError`] on the first user that cannot be provisioned.
pub async fn provision_users(
    source: &dyn SourceTracker,
    destination: &dyn DestinationTracker,
    resolver: &mut IdentityResolver,
    project: &Project,
    project_id: u64,
    placeholder_password: &str,
) -> Result<ProvisioningReport, ProvisioningError> {
    let span = info_span!("provision_users", project = %project.name, project_id);

    async {
        let authors = project.author_usernames();
        info!(count = authors.len(), "Provisioning users");

        let mut report = ProvisioningReport::default();

        for username in authors {
            if is_reserved(&username) {
                debug!(username = %username, "Reserved user, skipping");
                continue;
            }

            let profile = source.find_user(&username).await.map_err(|source| {
                ProvisioningError::SourceLookup {
                    username: username.clone(),
                    source,
                }
            })?;

            let Some(profile) = profile else {
                warn!(
                    username = %username,
                    "User unknown to source, writes will use the administrator"
                );
                report.unresolved.push(username);
                continue;
            };

            let user = ensure_user(
                destination,
                resolver,
                NewUser {
                    username: username.clone(),
                    email: profile.email.clone(),
                    name: profile.display_name.clone(),
                    password: placeholder_password.to_string(),
                    admin: true,
                },
            )
            .await?;

            add_member(destination, project_id, &user).await?;

            report.users.push(UserIdentity {
                username,
                email: profile.email,
                display_name: profile.display_name,
                destination_id: Some(user.id),
            });
        }

        info!(
            provisioned = report.users.len(),
            unresolved = report.unresolved.len(),
            "Users provisioned"
        );
        Ok(report)
    }
    .instrument(span)
    .await
}

/// Returns the existing destination user or creates it.
async fn ensure_user(
    destination: &dyn DestinationTracker,
    resolver: &mut IdentityResolver,
    new_user: NewUser,
) -> Result<DestinationUser, ProvisioningError> {
    let existing = resolver
        .resolve(destination, &new_user.username)
        .await
        .map_err(|source| ProvisioningError::DestinationLookup {
            username: new_user.username.clone(),
            source,
        })?;

    if let Some(user) = existing {
        info!(username = %user.username, "User already exists");
        return Ok(user);
    }

    debug!(username = %new_user.username, "Creating user");
    let user = destination
        .create_user(&new_user)
        .await
        .map_err(|source| ProvisioningError::Creation {
            username: new_user.username.clone(),
            source,
        })?;
    info!(username = %user.username, id = user.id, "User created");
    resolver.remember(user.clone());
    Ok(user)
}

/// Makes `user` a maintainer, treating an existing membership as success.
async fn add_member(
    destination: &dyn DestinationTracker,
    project_id: u64,
    user: &DestinationUser,
) -> Result<(), ProvisioningError> {
    match destination
        .add_project_member(project_id, user.id, PROVISIONED_ACCESS)
        .await
    {
        Ok(()) => {
            info!(username = %user.username, "User added to project");
            Ok(())
        }
        Err(e) if e.is_conflict() => {
            debug!(username = %user.username, "User is already a project member");
            Ok(())
        }
        Err(source) => Err(ProvisioningError::Membership {
            username: user.username.clone(),
            project_id,
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::SourceIssue;
    use crate::project::Issue;
    use crate::testing::{
        sample_attachment, sample_comment, sample_issue, InMemoryDestination, InMemorySource,
    };
    use std::path::PathBuf;

    fn project_from(issues: Vec<SourceIssue>) -> Project {
        let mut project = Project::new("PRO");
        project.issues = issues
            .into_iter()
            .map(|mut issue| {
                let attachments = std::mem::take(&mut issue.attachments)
                    .into_iter()
                    .map(|a| crate::project::Attachment {
                        source_id: a.id,
                        filename: a.filename.clone(),
                        creator: crate::project::map_source_username(&a.author),
                        staged_path: PathBuf::from(a.filename),
                    })
                    .collect();
                Issue::from_source(issue, attachments)
            })
            .collect();
        project
    }

    fn source_knowing(names: &[&str]) -> InMemorySource {
        let source = InMemorySource::new();
        for name in names {
            source.add_user(name);
        }
        source
    }

    #[tokio::test]
    async fn creates_missing_users_as_admin_maintainers() {
        let mut issue = sample_issue("1", "PRO-1", "s");
        issue.comments.push(sample_comment("c", "bob", "hi"));
        issue.attachments.push(sample_attachment("a", "carol", "f.txt"));
        let project = project_from(vec![issue]);
        let source = source_knowing(&["alice", "bob", "carol"]);
        let destination = InMemoryDestination::new();
        let project_id = destination.add_project("PRO");
        let mut resolver = IdentityResolver::new();

        let report =
            provision_users(&source, &destination, &mut resolver, &project, project_id, "pw")
                .await
                .unwrap();

        let created: Vec<_> = destination
            .created_users()
            .into_iter()
            .map(|u| (u.username, u.email, u.admin, u.password))
            .collect();
        assert_eq!(
            created,
            vec![
                ("alice".to_string(), "alice@example.com".to_string(), true, "pw".to_string()),
                ("bob".to_string(), "bob@example.com".to_string(), true, "pw".to_string()),
                ("carol".to_string(), "carol@example.com".to_string(), true, "pw".to_string()),
            ]
        );
        assert_eq!(report.users.len(), 3);
        assert!(destination
            .members()
            .iter()
            .all(|(p, _, access)| *p == project_id && *access == AccessLevel::Maintainer));
        assert_eq!(resolver.len(), 3);
    }

    #[tokio::test]
    async fn reuses_existing_users_and_tolerates_membership_conflict() {
        let project = project_from(vec![sample_issue("1", "PRO-1", "s")]);
        let source = source_knowing(&["alice"]);
        let destination = InMemoryDestination::new();
        let project_id = destination.add_project("PRO");
        let alice = destination.add_user("alice");
        destination
            .add_project_member(project_id, alice.id, AccessLevel::Developer)
            .await
            .unwrap();
        let mut resolver = IdentityResolver::new();

        let report =
            provision_users(&source, &destination, &mut resolver, &project, project_id, "pw")
                .await
                .unwrap();

        assert!(destination.created_users().is_empty());
        assert_eq!(report.users[0].destination_id, Some(alice.id));
    }

    #[tokio::test]
    async fn reserved_names_are_never_created() {
        let mut issue = sample_issue("1", "PRO-1", "s");
        issue.creator = "admin".to_string();
        issue.comments.push(sample_comment("c", "", "anonymous"));
        let project = project_from(vec![issue]);
        let source = source_knowing(&["admin", "root"]);
        let destination = InMemoryDestination::new();
        let project_id = destination.add_project("PRO");
        let mut resolver = IdentityResolver::new();

        let report =
            provision_users(&source, &destination, &mut resolver, &project, project_id, "pw")
                .await
                .unwrap();

        assert!(report.users.is_empty());
        assert!(destination.created_users().is_empty());
        assert_eq!(destination.user_searches(), 0);
    }

    #[tokio::test]
    async fn unknown_source_users_are_reported_not_created() {
        let project = project_from(vec![sample_issue("1", "PRO-1", "s")]);
        let source = InMemorySource::new();
        let destination = InMemoryDestination::new();
        let project_id = destination.add_project("PRO");
        let mut resolver = IdentityResolver::new();

        let report =
            provision_users(&source, &destination, &mut resolver, &project, project_id, "pw")
                .await
                .unwrap();

        assert_eq!(report.unresolved, vec!["alice".to_string()]);
        assert!(destination.created_users().is_empty());
    }

    #[tokio::test]
    async fn creation_failure_is_fatal() {
        let project = project_from(vec![sample_issue("1", "PRO-1", "s")]);
        let source = source_knowing(&["alice"]);
        let destination = InMemoryDestination::new();
        let project_id = destination.add_project("PRO");
        destination.fail_user_creation();
        let mut resolver = IdentityResolver::new();

        let result =
            provision_users(&source, &destination, &mut resolver, &project, project_id, "pw")
                .await;

        assert!(matches!(
            result,
            Err(ProvisioningError::Creation { ref username, .. }) if username == "alice"
        ));
    }

    #[test]
    fn reserved_usernames() {
        assert!(is_reserved(""));
        assert!(is_reserved("root"));
        assert!(!is_reserved("admin"));
        assert!(!is_reserved("alice"));
    }
}
