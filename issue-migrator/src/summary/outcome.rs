//! Per-issue replay outcomes.

use serde::Serialize;
use std::path::PathBuf;

/// Terminal state of replaying one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IssueOutcome {
    /// An issue with the same title already exists.
    Skipped {
        /// Source issue id.
        source_id: String,
        /// Number of the existing destination issue.
        existing_iid: u64,
    },

    /// The issue was created. Later steps may have failed.
    Created {
        /// Source issue id.
        source_id: String,
        /// Number of the new destination issue.
        iid: u64,
        /// Comment, attachment or status steps that did not complete.
        failures: Vec<StepFailure>,
    },

    /// The issue could not be created and was written to disk instead.
    Quarantined {
        /// Source issue id.
        source_id: String,
        /// Last error seen.
        error: String,
        /// Where the issue record was written, if writing succeeded.
        path: Option<PathBuf>,
    },
}

impl IssueOutcome {
    /// Source id of the issue this outcome belongs to.
    #[must_use]
    pub fn source_id(&self) -> &str {
        match self {
            Self::Skipped { source_id, .. }
            | Self::Created { source_id, .. }
            | Self::Quarantined { source_id, .. } => source_id,
        }
    }

    /// Returns true for a created issue with at least one failed step.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Created { failures, .. } if !failures.is_empty())
    }
}

/// A step after issue creation that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepFailure {
    /// A comment could not be posted; later steps were abandoned.
    Comment {
        /// Zero based position of the comment.
        index: usize,
        /// Error message.
        error: String,
    },

    /// An attachment could not be uploaded or linked; later attachments
    /// were abandoned and its staged file was kept.
    Attachment {
        /// Original file name.
        filename: String,
        /// Error message.
        error: String,
    },

    /// The issue could not be closed.
    Close {
        /// Error message.
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_status_tag() {
        let outcome = IssueOutcome::Created {
            source_id: "10".to_string(),
            iid: 3,
            failures: vec![StepFailure::Close {
                error: "boom".to_string(),
            }],
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "created");
        assert_eq!(json["failures"][0]["step"], "close");
        assert!(outcome.is_partial());
        assert_eq!(outcome.source_id(), "10");
    }
}
