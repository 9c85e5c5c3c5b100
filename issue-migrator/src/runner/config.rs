//! Runner configuration.

use crate::config::MigrationSettings;
use crate::replay::{ReplayOptions, RetryPolicy};
use crate::snapshot::SnapshotOptions;
use std::path::{Path, PathBuf};

/// Everything a [`Runner`](super::Runner) needs besides the trackers.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Source project key, also the destination project name.
    project_name: String,
    /// Destination project id that skips the name search.
    project_id: Option<u64>,
    /// Visibility of a project created by the run.
    project_visibility: String,
    /// Root under which the run's staging directory is created.
    staging_root: PathBuf,
    /// Where quarantined issues are written.
    quarantine_dir: PathBuf,
    /// Password for created accounts.
    placeholder_password: String,
    snapshot: SnapshotOptions,
    replay: ReplayOptions,
}

impl RunnerConfig {
    /// Creates a configuration for migrating `project_name` with `settings`.
    pub fn new(project_name: impl Into<String>, settings: &MigrationSettings) -> Self {
        Self {
            project_name: project_name.into(),
            project_id: settings.destination.project_id,
            project_visibility: settings.destination.project_visibility.clone(),
            staging_root: settings.migration.staging_dir.clone(),
            quarantine_dir: settings.migration.quarantine_dir.clone(),
            placeholder_password: settings.migration.placeholder_password.clone(),
            snapshot: settings.migration.snapshot_options(),
            replay: settings.migration.replay_options(),
        }
    }

    /// Sets the staging root.
    pub fn with_staging_root(mut self, staging_root: PathBuf) -> Self {
        self.staging_root = staging_root;
        self
    }

    /// Sets the quarantine directory.
    pub fn with_quarantine_dir(mut self, quarantine_dir: PathBuf) -> Self {
        self.quarantine_dir = quarantine_dir;
        self
    }

    /// Sets the issue creation retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.replay.retry = retry;
        self
    }

    /// Sets the source search page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.snapshot.page_size = page_size;
        self
    }

    /// Returns the project name.
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Returns the configured destination project id.
    pub fn project_id(&self) -> Option<u64> {
        self.project_id
    }

    /// Returns the visibility used when creating the project.
    pub fn project_visibility(&self) -> &str {
        &self.project_visibility
    }

    /// Returns the staging root.
    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Returns the quarantine directory.
    pub fn quarantine_dir(&self) -> &Path {
        &self.quarantine_dir
    }

    /// Returns the password for created accounts.
    pub fn placeholder_password(&self) -> &str {
        &self.placeholder_password
    }

    /// Returns the snapshot tuning.
    pub fn snapshot(&self) -> &SnapshotOptions {
        &self.snapshot
    }

    /// Returns the replay parameters.
    pub fn replay(&self) -> &ReplayOptions {
        &self.replay
    }
}
