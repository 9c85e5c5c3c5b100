//! Orchestrates a complete migration run.

mod config;
mod error;

pub use config::RunnerConfig;
pub use error::RunnerError;

use crate::clients::{ClientError, DestinationTracker, GitLabClient, JiraClient, SourceTracker};
use crate::config::MigrationSettings;
use crate::identity::IdentityResolver;
use crate::replay::{IssueReplayer, Quarantine};
use crate::snapshot::{build_snapshot, SnapshotError, StagingDir};
use crate::summary::RunSummary;
use crate::users::provision_users;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs snapshot, project resolution, provisioning and replay in order.
pub struct Runner {
    config: RunnerConfig,
    source: Arc<dyn SourceTracker>,
    destination: Arc<dyn DestinationTracker>,
}

impl Runner {
    /// Builds a runner over arbitrary trackers.
    pub fn new(
        config: RunnerConfig,
        source: Arc<dyn SourceTracker>,
        destination: Arc<dyn DestinationTracker>,
    ) -> Self {
        Self {
            config,
            source,
            destination,
        }
    }

    /// Builds a runner talking to the Jira and GitLab servers in `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Config`] for invalid settings and
    /// [`RunnerError::Client`] if a client cannot be constructed.
    pub fn connect(
        project_name: impl Into<String>,
        settings: &MigrationSettings,
    ) -> Result<Self, RunnerError> {
        settings.validate()?;
        let source = JiraClient::new(
            &settings.source.url,
            &settings.source.username,
            &settings.source.password,
        )?;
        let destination = GitLabClient::new(&settings.destination.url, &settings.destination.token)?;

        Ok(Self::new(
            RunnerConfig::new(project_name, settings),
            Arc::new(source),
            Arc::new(destination),
        ))
    }

    /// Returns the run configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Executes the full migration.
    ///
    /// Per-issue failures end up in the returned summary.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] if any stage before issue replay fails.
    pub async fn run(&self) -> Result<RunSummary, RunnerError> {
        let name = self.config.project_name();
        let mut summary = RunSummary::new(name);

        let staging_root = self.config.staging_root();
        let staging = StagingDir::create(staging_root).map_err(|source| SnapshotError::Staging {
            path: staging_root.display().to_string(),
            source,
        })?;
        info!(path = %staging.path().display(), "Staging attachments");

        let snapshot = build_snapshot(
            self.source.as_ref(),
            name,
            &staging,
            self.config.snapshot(),
        )
        .await?;
        let mut project = snapshot.project;
        summary.issues_discovered = project.issues.len();
        summary.snapshot_errors = snapshot.errors;

        let project_id = self.resolve_project().await?;
        project.id = Some(project_id);
        summary.project_id = project_id;

        let mut resolver = IdentityResolver::new();
        let report = provision_users(
            self.source.as_ref(),
            self.destination.as_ref(),
            &mut resolver,
            &project,
            project_id,
            self.config.placeholder_password(),
        )
        .await?;
        summary.users_provisioned = report.users.len();
        summary.unresolved_users = report.unresolved;
        project.users = report.users;

        let quarantine = Quarantine::new(self.config.quarantine_dir());
        let outcomes = IssueReplayer::new(
            self.destination.as_ref(),
            &mut resolver,
            &quarantine,
            self.config.replay(),
            project_id,
        )
        .replay_all(&project.issues)
        .await;

        for outcome in outcomes {
            summary.record_outcome(outcome);
        }

        if summary.has_failures() {
            warn!(
                quarantined = summary.issues_quarantined,
                dir = %quarantine.dir().display(),
                "Some issues were quarantined"
            );
        }
        info!(
            created = summary.issues_created,
            skipped = summary.issues_skipped,
            quarantined = summary.issues_quarantined,
            "Migration finished"
        );
        Ok(summary)
    }

    /// Finds or creates the destination project and returns its id.
    async fn resolve_project(&self) -> Result<u64, RunnerError> {
        let name = self.config.project_name();
        if let Some(id) = self.config.project_id() {
            info!(project_id = id, "Using configured destination project");
            return Ok(id);
        }

        let resolution_failed = |source: ClientError| RunnerError::ProjectResolution {
            name: name.to_string(),
            source,
        };

        let matches: Vec<_> = self
            .destination
            .search_projects(name)
            .await
            .map_err(resolution_failed)?
            .into_iter()
            .filter(|project| project.name == name)
            .collect();

        match matches.as_slice() {
            [] => {
                info!(project = %name, "Creating destination project");
                let project = self
                    .destination
                    .create_project(name, self.config.project_visibility())
                    .await
                    .map_err(resolution_failed)?;
                info!(project_id = project.id, "Destination project created");
                Ok(project.id)
            }
            [project] => {
                info!(project_id = project.id, "Found destination project");
                Ok(project.id)
            }
            _ => {
                error!(project = %name, count = matches.len(), "Ambiguous destination project");
                Err(RunnerError::AmbiguousProject {
                    name: name.to_string(),
                    count: matches.len(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::RetryPolicy;
    use crate::testing::{sample_issue, InMemoryDestination, InMemorySource};
    use tempfile::TempDir;

    struct Setup {
        source: Arc<InMemorySource>,
        destination: Arc<InMemoryDestination>,
        temp: TempDir,
    }

    impl Setup {
        fn new() -> Self {
            let source = Arc::new(InMemorySource::new());
            source.add_user("alice");
            source.add_issue(sample_issue("1", "PRO-1", "First"));
            Self {
                source,
                destination: Arc::new(InMemoryDestination::new()),
                temp: TempDir::new().unwrap(),
            }
        }

        fn runner(&self, settings: &MigrationSettings) -> Runner {
            let config = RunnerConfig::new("PRO", settings)
                .with_staging_root(self.temp.path().join("tmp"))
                .with_quarantine_dir(self.temp.path().join("quarantine"))
                .with_retry(RetryPolicy::none());
            Runner::new(config, self.source.clone(), self.destination.clone())
        }
    }

    #[tokio::test]
    async fn creates_missing_project() {
        let setup = Setup::new();

        let summary = setup.runner(&MigrationSettings::default()).run().await.unwrap();

        let projects = setup.destination.projects();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "PRO");
        assert_eq!(summary.project_id, projects[0].id);
        assert_eq!(summary.issues_created, 1);
    }

    #[tokio::test]
    async fn reuses_exact_name_match_only() {
        let setup = Setup::new();
        setup.destination.add_project("PRO-legacy");
        let id = setup.destination.add_project("PRO");

        let summary = setup.runner(&MigrationSettings::default()).run().await.unwrap();

        assert_eq!(summary.project_id, id);
        assert_eq!(setup.destination.projects().len(), 2);
    }

    #[tokio::test]
    async fn ambiguous_project_is_fatal() {
        let setup = Setup::new();
        setup.destination.add_project("PRO");
        setup.destination.add_project("PRO");

        let err = setup
            .runner(&MigrationSettings::default())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::AmbiguousProject { count: 2, .. }));
        assert_eq!(err.exit_code(), 4);
        assert!(setup.destination.issues().is_empty());
    }

    #[tokio::test]
    async fn configured_project_id_skips_search() {
        let setup = Setup::new();
        setup.destination.fail_project_search();
        let id = setup.destination.add_project("Renamed");
        let mut settings = MigrationSettings::default();
        settings.destination.project_id = Some(id);

        let summary = setup.runner(&settings).run().await.unwrap();

        assert_eq!(summary.project_id, id);
    }

    #[tokio::test]
    async fn project_search_failure_is_fatal() {
        let setup = Setup::new();
        setup.destination.fail_project_search();

        let err = setup
            .runner(&MigrationSettings::default())
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 5);
    }

    #[tokio::test]
    async fn source_search_failure_writes_nothing() {
        let setup = Setup::new();
        setup.source.fail_search();

        let err = setup
            .runner(&MigrationSettings::default())
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 3);
        assert!(setup.destination.projects().is_empty());
    }

    #[tokio::test]
    async fn provisioning_failure_is_fatal() {
        let setup = Setup::new();
        setup.destination.fail_user_creation();

        let err = setup
            .runner(&MigrationSettings::default())
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 6);
        assert!(setup.destination.issues().is_empty());
    }

    #[tokio::test]
    async fn unusable_staging_root_is_fatal() {
        let setup = Setup::new();
        let blocker = setup.temp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let config = RunnerConfig::new("PRO", &MigrationSettings::default())
            .with_staging_root(blocker.join("tmp"));
        let runner = Runner::new(config, setup.source.clone(), setup.destination.clone());

        let err = runner.run().await.unwrap_err();

        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn connect_rejects_incomplete_settings() {
        let result = Runner::connect("PRO", &MigrationSettings::default());
        assert!(matches!(result, Err(RunnerError::Config(_))));
    }
}
