//! Replays snapshot issues into the destination project.
//!
//! Each issue moves through existence check, identity resolution, creation,
//! comments, attachments and status reconciliation, and ends in exactly one
//! [`IssueOutcome`]. Failures stay local to the issue they happen in.

mod error;
mod quarantine;
mod retry;

pub use error::QuarantineError;
pub use quarantine::Quarantine;
pub use retry::{RetryPolicy, DEFAULT_ATTEMPTS, DEFAULT_DELAY};

use crate::clients::{Actor, ClientError, DestinationTracker, NewIssue, StateEvent};
use crate::identity::IdentityResolver;
use crate::project::{Attachment, Issue, DESTINATION_ADMIN};
use crate::summary::{IssueOutcome, StepFailure};
use crate::text::translate_markup;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Label applied to every created issue unless configured otherwise.
pub const DEFAULT_LABEL: &str = "To Do";

/// Assignee used when the source assignee has no destination account.
pub const DEFAULT_ASSIGNEE_ID: u64 = 1;

/// Fixed parameters of a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Label attached to every created issue.
    pub default_label: String,

    /// Destination user id assigned when the assignee cannot be resolved.
    pub default_assignee_id: u64,

    /// Retry policy for issue creation.
    pub retry: RetryPolicy,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            default_label: DEFAULT_LABEL.to_string(),
            default_assignee_id: DEFAULT_ASSIGNEE_ID,
            retry: RetryPolicy::default(),
        }
    }
}

/// Writes issues of one snapshot into one destination project.
pub struct IssueReplayer<'a> {
    destination: &'a dyn DestinationTracker,
    resolver: &'a mut IdentityResolver,
    quarantine: &'a Quarantine,
    options: &'a ReplayOptions,
    project_id: u64,
}

impl<'a> IssueReplayer<'a> {
    /// Creates a replayer for `project_id`.
    pub fn new(
        destination: &'a dyn DestinationTracker,
        resolver: &'a mut IdentityResolver,
        quarantine: &'a Quarantine,
        options: &'a ReplayOptions,
        project_id: u64,
    ) -> Self {
        Self {
            destination,
            resolver,
            quarantine,
            options,
            project_id,
        }
    }

    /// Replays every issue in order.
    pub async fn replay_all(&mut self, issues: &[Issue]) -> Vec<IssueOutcome> {
        let mut outcomes = Vec::with_capacity(issues.len());
        for issue in issues {
            outcomes.push(self.replay(issue).await);
        }
        outcomes
    }

    /// Replays a single issue.
    pub async fn replay(&mut self, issue: &Issue) -> IssueOutcome {
        let span = info_span!("replay_issue", issue = %issue.key, source_id = %issue.source_id);

        async {
            match self.find_existing(&issue.title).await {
                Ok(Some(iid)) => {
                    info!(iid, "Issue already exists, skipping");
                    return IssueOutcome::Skipped {
                        source_id: issue.source_id.clone(),
                        existing_iid: iid,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "Failed to search for existing issue");
                    return self.quarantine_issue(issue, format!("existence check failed: {e}"));
                }
            }

            let assignee_id = self.assignee_id(issue.assignee.as_deref()).await;
            let author = self.actor_for(&issue.creator).await;
            let new_issue = NewIssue {
                title: issue.title.clone(),
                description: translate_markup(&issue.description),
                assignee_ids: vec![assignee_id],
                labels: vec![self.options.default_label.clone()],
                created_at: issue.created_at,
            };

            let destination = self.destination;
            let project_id = self.project_id;
            let created = self
                .options
                .retry
                .run(|attempt| {
                    debug!(attempt, "Creating issue");
                    destination.create_issue(project_id, &new_issue, &author)
                })
                .await;

            let iid = match created {
                Ok(created) => {
                    info!(iid = created.iid, "Issue created");
                    created.iid
                }
                Err(e) => {
                    error!(error = %e, "Failed to create issue");
                    return self.quarantine_issue(issue, e.to_string());
                }
            };

            let failures = self.complete(issue, iid).await;
            IssueOutcome::Created {
                source_id: issue.source_id.clone(),
                iid,
                failures,
            }
        }
        .instrument(span)
        .await
    }

    /// Posts comments and attachments and reconciles the status.
    async fn complete(&mut self, issue: &Issue, iid: u64) -> Vec<StepFailure> {
        let mut failures = Vec::new();

        for (index, comment) in issue.comments.iter().enumerate() {
            let author = self.actor_for(&comment.creator).await;
            let body = translate_markup(&comment.body);
            if let Err(e) = self
                .destination
                .create_note(self.project_id, iid, &body, &author)
                .await
            {
                error!(index, error = %e, "Failed to create comment, abandoning issue");
                failures.push(StepFailure::Comment {
                    index,
                    error: e.to_string(),
                });
                return failures;
            }
        }

        for attachment in &issue.attachments {
            if let Err(failure) = self.attach(iid, attachment).await {
                failures.push(failure);
                break;
            }
        }

        if !issue.is_open() {
            debug!(status = %issue.status, "Closing issue");
            if let Err(e) = self
                .destination
                .update_issue_state(self.project_id, iid, StateEvent::Close)
                .await
            {
                error!(error = %e, "Failed to close issue");
                failures.push(StepFailure::Close {
                    error: e.to_string(),
                });
            }
        }

        failures
    }

    /// Uploads one staged attachment and links it from a note.
    async fn attach(&self, iid: u64, attachment: &Attachment) -> Result<(), StepFailure> {
        let failed = |e: &dyn std::fmt::Display| StepFailure::Attachment {
            filename: attachment.filename.clone(),
            error: e.to_string(),
        };

        let uploaded = self
            .destination
            .upload_file(self.project_id, &attachment.staged_path)
            .await
            .map_err(|e| {
                error!(filename = %attachment.filename, error = %e, "Failed to upload attachment");
                failed(&e)
            })?;

        self.destination
            .create_note(self.project_id, iid, &uploaded.markdown, &Actor::Service)
            .await
            .map_err(|e| {
                error!(filename = %attachment.filename, error = %e, "Failed to link attachment");
                failed(&e)
            })?;

        debug!(filename = %attachment.filename, url = %uploaded.url, "Attachment uploaded");
        if let Err(e) = std::fs::remove_file(&attachment.staged_path) {
            warn!(
                path = %attachment.staged_path.display(),
                error = %e,
                "Failed to remove staged attachment"
            );
        }
        Ok(())
    }

    /// Returns the iid of an issue whose title equals `title` exactly.
    async fn find_existing(&self, title: &str) -> Result<Option<u64>, ClientError> {
        let issues = self.destination.search_issues(self.project_id, title).await?;
        Ok(issues
            .into_iter()
            .find(|existing| existing.title == title)
            .map(|existing| existing.iid))
    }

    async fn assignee_id(&mut self, assignee: Option<&str>) -> u64 {
        let fallback = self.options.default_assignee_id;
        let Some(username) = assignee.filter(|name| !name.is_empty()) else {
            return fallback;
        };

        match self.resolver.resolve(self.destination, username).await {
            Ok(Some(user)) => user.id,
            Ok(None) => {
                warn!(assignee = %username, fallback, "Assignee not found, using default");
                fallback
            }
            Err(e) => {
                warn!(
                    assignee = %username,
                    error = %e,
                    fallback,
                    "Assignee lookup failed, using default"
                );
                fallback
            }
        }
    }

    /// Identity that writes on behalf of `username`.
    async fn actor_for(&mut self, username: &str) -> Actor {
        let admin = || Actor::User(DESTINATION_ADMIN.to_string());
        if username.is_empty() || username == DESTINATION_ADMIN {
            return admin();
        }

        match self.resolver.resolve(self.destination, username).await {
            Ok(Some(user)) => Actor::User(user.username),
            Ok(None) => {
                warn!(author = %username, "Author not found, writing as administrator");
                admin()
            }
            Err(e) => {
                warn!(
                    author = %username,
                    error = %e,
                    "Author lookup failed, writing as administrator"
                );
                admin()
            }
        }
    }

    fn quarantine_issue(&self, issue: &Issue, error: String) -> IssueOutcome {
        let path = match self.quarantine.store(issue) {
            Ok(path) => {
                warn!(path = %path.display(), "Issue quarantined");
                Some(path)
            }
            Err(QuarantineError::AlreadyExists { path }) => {
                warn!(path = %path.display(), "Issue already quarantined, keeping earlier record");
                Some(path)
            }
            Err(e) => {
                error!(error = %e, "Failed to write quarantine record");
                None
            }
        };

        IssueOutcome::Quarantined {
            source_id: issue.source_id.clone(),
            error,
            path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Comment;
    use crate::testing::{sample_issue, InMemoryDestination};
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        destination: InMemoryDestination,
        project_id: u64,
        resolver: IdentityResolver,
        quarantine: Quarantine,
        options: ReplayOptions,
        temp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let destination = InMemoryDestination::new();
            let project_id = destination.add_project("PRO");
            Self {
                destination,
                project_id,
                resolver: IdentityResolver::new(),
                quarantine: Quarantine::new(temp.path().join("quarantine")),
                options: ReplayOptions {
                    retry: RetryPolicy {
                        attempts: 3,
                        delay: Duration::ZERO,
                    },
                    ..ReplayOptions::default()
                },
                temp,
            }
        }

        async fn replay(&mut self, issue: &Issue) -> IssueOutcome {
            IssueReplayer::new(
                &self.destination,
                &mut self.resolver,
                &self.quarantine,
                &self.options,
                self.project_id,
            )
            .replay(issue)
            .await
        }

        fn staged(&self, name: &str, bytes: &[u8]) -> PathBuf {
            let path = self.temp.path().join(name);
            std::fs::write(&path, bytes).unwrap();
            path
        }
    }

    fn issue(id: &str) -> Issue {
        Issue::from_source(sample_issue(id, &format!("PRO-{id}"), "Crash"), Vec::new())
    }

    fn attachment(path: &Path, creator: &str) -> Attachment {
        Attachment {
            source_id: "a".to_string(),
            filename: path.file_name().unwrap().to_string_lossy().into_owned(),
            creator: creator.to_string(),
            staged_path: path.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn creates_issue_as_resolved_creator() {
        let mut fixture = Fixture::new();
        fixture.destination.add_user("alice");
        let bob = fixture.destination.add_user("bob");
        let mut issue = issue("1");
        issue.assignee = Some("bob".to_string());
        issue.description = "{code:java}x{code}".to_string();

        let outcome = fixture.replay(&issue).await;

        assert!(matches!(outcome, IssueOutcome::Created { ref failures, .. } if failures.is_empty()));
        let stored = &fixture.destination.issues()[0];
        assert_eq!(stored.title, "PRO-1:Crash");
        assert_eq!(stored.description, "```javax```");
        assert_eq!(stored.assignee_ids, vec![bob.id]);
        assert_eq!(stored.labels, vec!["To Do".to_string()]);
        assert_eq!(stored.author, Actor::User("alice".to_string()));
        assert_eq!(stored.created_at, Some(issue.created_at));
        assert!(!stored.closed);
    }

    #[tokio::test]
    async fn unresolved_identities_fall_back() {
        let mut fixture = Fixture::new();
        let mut issue = issue("1");
        issue.assignee = Some("ghost".to_string());

        fixture.replay(&issue).await;

        let stored = &fixture.destination.issues()[0];
        assert_eq!(stored.assignee_ids, vec![DEFAULT_ASSIGNEE_ID]);
        assert_eq!(stored.author, Actor::User("root".to_string()));
    }

    #[tokio::test]
    async fn exact_title_match_is_skipped() {
        let mut fixture = Fixture::new();
        fixture.destination.add_issue(fixture.project_id, "PRO-1:Crash");

        let outcome = fixture.replay(&issue("1")).await;

        assert_eq!(
            outcome,
            IssueOutcome::Skipped {
                source_id: "1".to_string(),
                existing_iid: 1
            }
        );
        assert_eq!(fixture.destination.create_issue_attempts("PRO-1:Crash"), 0);
    }

    #[tokio::test]
    async fn partial_title_match_is_not_a_duplicate() {
        let mut fixture = Fixture::new();
        fixture
            .destination
            .add_issue(fixture.project_id, "PRO-1:Crash on startup");

        let outcome = fixture.replay(&issue("1")).await;

        assert!(matches!(outcome, IssueOutcome::Created { iid: 2, .. }));
    }

    #[tokio::test]
    async fn exhausted_retries_quarantine_the_issue() {
        let mut fixture = Fixture::new();
        fixture.destination.fail_create_issue("PRO-7:Crash");
        let issue = issue("7");

        let outcome = fixture.replay(&issue).await;

        let IssueOutcome::Quarantined { path: Some(path), .. } = &outcome else {
            panic!("expected quarantine, got {outcome:?}");
        };
        assert_eq!(fixture.destination.create_issue_attempts("PRO-7:Crash"), 3);
        assert_eq!(path.file_name().unwrap(), "7.json");
        assert_eq!(Quarantine::load(path).unwrap(), issue);
    }

    #[tokio::test]
    async fn comments_are_written_as_their_authors() {
        let mut fixture = Fixture::new();
        fixture.destination.add_user("bob");
        let mut issue = issue("1");
        issue.comments = vec![
            Comment {
                body: "{noformat}log{noformat}".to_string(),
                creator: "bob".to_string(),
            },
            Comment {
                body: "second".to_string(),
                creator: "nobody".to_string(),
            },
        ];

        fixture.replay(&issue).await;

        let notes = &fixture.destination.issues()[0].notes;
        assert_eq!(notes[0].body, "```log```");
        assert_eq!(notes[0].author, Actor::User("bob".to_string()));
        assert_eq!(notes[1].author, Actor::User("root".to_string()));
    }

    #[tokio::test]
    async fn comment_failure_abandons_remaining_steps() {
        let mut fixture = Fixture::new();
        fixture.destination.fail_notes_containing("explode");
        let staged = fixture.staged("log.txt", b"log");
        let mut issue = issue("1");
        issue.status = "Closed".to_string();
        issue.comments = vec![
            Comment {
                body: "explode".to_string(),
                creator: "alice".to_string(),
            },
            Comment {
                body: "after".to_string(),
                creator: "alice".to_string(),
            },
        ];
        issue.attachments.push(attachment(&staged, "alice"));

        let outcome = fixture.replay(&issue).await;

        let IssueOutcome::Created { failures, .. } = &outcome else {
            panic!("expected created, got {outcome:?}");
        };
        assert!(matches!(failures.as_slice(), [StepFailure::Comment { index: 0, .. }]));
        let stored = &fixture.destination.issues()[0];
        assert!(stored.notes.is_empty());
        assert!(!stored.closed);
        assert!(fixture.destination.uploads().is_empty());
        assert!(staged.exists());
    }

    #[tokio::test]
    async fn uploaded_attachments_are_linked_and_removed() {
        let mut fixture = Fixture::new();
        let first = fixture.staged("a.png", b"a");
        let second = fixture.staged("b.log", b"b");
        let mut issue = issue("1");
        issue.attachments = vec![attachment(&first, "alice"), attachment(&second, "alice")];

        fixture.replay(&issue).await;

        let notes = &fixture.destination.issues()[0].notes;
        assert_eq!(notes.len(), 2);
        assert!(notes[0].body.starts_with("[a.png]("));
        assert_eq!(notes[0].author, Actor::Service);
        assert!(!first.exists());
        assert!(!second.exists());
    }

    #[tokio::test]
    async fn upload_failure_keeps_staged_file_and_still_closes() {
        let mut fixture = Fixture::new();
        fixture.destination.fail_uploads();
        let first = fixture.staged("a.png", b"a");
        let second = fixture.staged("b.log", b"b");
        let mut issue = issue("1");
        issue.status = "Resolved".to_string();
        issue.attachments = vec![attachment(&first, "alice"), attachment(&second, "alice")];

        let outcome = fixture.replay(&issue).await;

        let IssueOutcome::Created { failures, .. } = &outcome else {
            panic!("expected created, got {outcome:?}");
        };
        assert_eq!(failures.len(), 1);
        assert!(matches!(&failures[0], StepFailure::Attachment { filename, .. } if filename == "a.png"));
        assert!(first.exists());
        assert!(second.exists());
        assert!(fixture.destination.issues()[0].closed);
    }

    #[tokio::test]
    async fn only_exact_open_status_stays_open() {
        let mut fixture = Fixture::new();
        let mut open = issue("1");
        open.status = "Open".to_string();
        let mut lowercase = issue("2");
        lowercase.status = "open".to_string();

        fixture.replay(&open).await;
        fixture.replay(&lowercase).await;

        let issues = fixture.destination.issues();
        assert!(!issues[0].closed);
        assert!(issues[1].closed);
    }

    #[tokio::test]
    async fn close_failure_is_recorded_not_fatal() {
        let mut fixture = Fixture::new();
        fixture.destination.fail_close();
        let mut issue = issue("1");
        issue.status = "Done".to_string();

        let outcome = fixture.replay(&issue).await;

        assert!(matches!(
            outcome,
            IssueOutcome::Created { ref failures, .. }
                if matches!(failures.as_slice(), [StepFailure::Close { .. }])
        ));
    }

    #[tokio::test]
    async fn replay_all_keeps_going_after_quarantine() {
        let mut fixture = Fixture::new();
        fixture.destination.fail_create_issue("PRO-1:Crash");
        let issues = vec![issue("1"), issue("2")];

        let outcomes = IssueReplayer::new(
            &fixture.destination,
            &mut fixture.resolver,
            &fixture.quarantine,
            &fixture.options,
            fixture.project_id,
        )
        .replay_all(&issues)
        .await;

        assert!(matches!(outcomes[0], IssueOutcome::Quarantined { .. }));
        assert!(matches!(outcomes[1], IssueOutcome::Created { .. }));
    }
}
