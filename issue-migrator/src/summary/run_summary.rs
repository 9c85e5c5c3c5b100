//! Run summary types.

use super::outcome::IssueOutcome;
use serde::Serialize;

/// Summary of a complete migration run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Name of the migrated project.
    pub project: String,

    /// Destination project id.
    pub project_id: u64,

    /// Number of issues read from the source.
    pub issues_discovered: usize,

    /// Issues and attachments that could not be read from the source.
    pub snapshot_errors: usize,

    /// Number of users that exist in the destination project.
    pub users_provisioned: usize,

    /// Authors the source could not describe.
    pub unresolved_users: Vec<String>,

    /// Number of issues created (including partial ones).
    pub issues_created: usize,

    /// Number of created issues with failed follow-up steps.
    pub issues_partial: usize,

    /// Number of issues skipped because they already existed.
    pub issues_skipped: usize,

    /// Number of issues written to quarantine.
    pub issues_quarantined: usize,

    /// Every per-issue outcome in replay order.
    pub outcomes: Vec<IssueOutcome>,
}

impl RunSummary {
    /// Creates a new empty summary for a project.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Default::default()
        }
    }

    /// Updates the counters with an issue outcome and keeps the outcome.
    pub fn record_outcome(&mut self, outcome: IssueOutcome) {
        match &outcome {
            IssueOutcome::Skipped { .. } => self.issues_skipped += 1,
            IssueOutcome::Created { failures, .. } => {
                self.issues_created += 1;
                if !failures.is_empty() {
                    self.issues_partial += 1;
                }
            }
            IssueOutcome::Quarantined { .. } => self.issues_quarantined += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Source ids of the quarantined issues.
    #[must_use]
    pub fn quarantined_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, IssueOutcome::Quarantined { .. }))
            .map(IssueOutcome::source_id)
            .collect()
    }

    /// Returns true if any issue ended up in quarantine.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.issues_quarantined > 0
    }

    /// Returns true if every issue was created or skipped without errors.
    #[must_use]
    pub fn all_success(&self) -> bool {
        self.issues_quarantined == 0 && self.issues_partial == 0 && self.snapshot_errors == 0
    }
}
