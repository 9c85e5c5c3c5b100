//! Settings file deserialization.

use crate::replay::{ReplayOptions, RetryPolicy, DEFAULT_ASSIGNEE_ID, DEFAULT_LABEL};
use crate::snapshot::{SnapshotOptions, DEFAULT_PAGE_SIZE};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Password given to every created destination account.
pub const DEFAULT_PLACEHOLDER_PASSWORD: &str = "dummy12345";

/// Parsed `issue-migrator.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MigrationSettings {
    /// Source tracker connection.
    #[serde(default)]
    pub source: SourceSettings,

    /// Destination tracker connection.
    #[serde(default)]
    pub destination: DestinationSettings,

    /// Run behaviour.
    #[serde(default)]
    pub migration: MigrationOptions,
}

/// `[source]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SourceSettings {
    /// Base URL of the Jira server.
    #[serde(default)]
    pub url: String,

    /// Account used for basic authentication.
    #[serde(default)]
    pub username: String,

    /// Password of [`SourceSettings::username`].
    #[serde(default)]
    pub password: String,
}

/// `[destination]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DestinationSettings {
    /// Base URL of the GitLab server.
    #[serde(default)]
    pub url: String,

    /// Administrator private token.
    #[serde(default)]
    pub token: String,

    /// Use this project id instead of searching by name.
    #[serde(default)]
    pub project_id: Option<u64>,

    /// Visibility of a project created by the run.
    #[serde(default = "default_visibility")]
    pub project_visibility: String,
}

impl Default for DestinationSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            project_id: None,
            project_visibility: default_visibility(),
        }
    }
}

/// `[migration]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct MigrationOptions {
    /// Root of the attachment staging area.
    pub staging_dir: PathBuf,

    /// Directory receiving quarantined issues.
    pub quarantine_dir: PathBuf,

    /// Source search page size.
    pub page_size: usize,

    /// Maximum number of issues to migrate, `0` for all.
    pub limit: usize,

    /// Label applied to created issues.
    pub default_label: String,

    /// Assignee used when none can be resolved.
    pub default_assignee_id: u64,

    /// Password for created destination accounts.
    pub placeholder_password: String,

    /// Issue creation attempts.
    pub retry_attempts: u32,

    /// Seconds between issue creation attempts.
    pub retry_delay_secs: u64,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            staging_dir: PathBuf::from("./tmp"),
            quarantine_dir: PathBuf::from("./quarantine"),
            page_size: DEFAULT_PAGE_SIZE,
            limit: 0,
            default_label: DEFAULT_LABEL.to_string(),
            default_assignee_id: DEFAULT_ASSIGNEE_ID,
            placeholder_password: DEFAULT_PLACEHOLDER_PASSWORD.to_string(),
            retry_attempts: retry.attempts,
            retry_delay_secs: retry.delay.as_secs(),
        }
    }
}

impl MigrationOptions {
    /// Snapshot tuning derived from these options.
    #[must_use]
    pub fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            page_size: self.page_size,
            limit: (self.limit > 0).then_some(self.limit),
        }
    }

    /// Replay parameters derived from these options.
    #[must_use]
    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            default_label: self.default_label.clone(),
            default_assignee_id: self.default_assignee_id,
            retry: RetryPolicy {
                attempts: self.retry_attempts,
                delay: Duration::from_secs(self.retry_delay_secs),
            },
        }
    }
}

fn default_visibility() -> String {
    "public".to_string()
}
