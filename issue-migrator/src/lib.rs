#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

pub mod clients;
pub mod config;
pub mod identity;
pub mod project;
pub mod replay;
pub mod runner;
pub mod snapshot;
pub mod summary;
pub mod text;
pub mod users;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use clients::{
    Actor, ClientError, DestinationTracker, GitLabClient, JiraClient, SourceTracker,
};
pub use config::{ConfigError, MigrationSettings};
pub use identity::IdentityResolver;
pub use project::{Attachment, Comment, Issue, Project, UserIdentity};
pub use replay::{IssueReplayer, Quarantine, QuarantineError, ReplayOptions, RetryPolicy};
pub use runner::{Runner, RunnerConfig, RunnerError};
pub use snapshot::{build_snapshot, Snapshot, SnapshotError, SnapshotOptions, StagingDir};
pub use summary::{IssueOutcome, RunSummary, StepFailure};
pub use text::translate_markup;
pub use users::{provision_users, ProvisioningError, ProvisioningReport};
