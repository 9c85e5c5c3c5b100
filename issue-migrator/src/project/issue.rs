//! Issues and their owned comments and attachments.

use crate::clients::SourceIssue;
use crate::project::map_source_username;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The only source status that leaves a migrated issue open.
pub const OPEN_STATUS: &str = "Open";

/// An issue ready to be replayed into the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Source tracker id, used for quarantine file names.
    pub source_id: String,

    /// Source tracker key such as `PRO-12`.
    pub key: String,

    /// `"{key}:{summary}"`, the duplicate detection key.
    pub title: String,

    /// Description in source markup.
    pub description: String,

    /// Source workflow status.
    pub status: String,

    /// Author username.
    pub creator: String,

    /// Assignee username, if any.
    pub assignee: Option<String>,

    /// When the issue was created in the source.
    pub created_at: DateTime<Utc>,

    /// Comments in source order.
    pub comments: Vec<Comment>,

    /// Successfully staged attachments in source order.
    pub attachments: Vec<Attachment>,
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Body in source markup.
    pub body: String,

    /// Author username.
    pub creator: String,
}

/// An attachment whose bytes are staged on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Source tracker attachment id.
    pub source_id: String,

    /// Original file name.
    pub filename: String,

    /// Uploader username.
    pub creator: String,

    /// Location of the downloaded bytes.
    pub staged_path: PathBuf,
}

impl Issue {
    /// Builds the duplicate detection title for a source issue.
    #[must_use]
    pub fn title_for(key: &str, summary: &str) -> String {
        format!("{key}:{summary}")
    }

    /// Converts a fetched source issue, keeping only the staged attachments.
    ///
    /// Every identity reference goes through [`map_source_username`].
    #[must_use]
    pub fn from_source(source: SourceIssue, attachments: Vec<Attachment>) -> Self {
        Self {
            title: Self::title_for(&source.key, &source.summary),
            source_id: source.id,
            key: source.key,
            description: source.description,
            status: source.status,
            creator: map_source_username(&source.creator),
            assignee: source
                .assignee
                .as_deref()
                .map(map_source_username),
            created_at: source.created,
            comments: source
                .comments
                .into_iter()
                .map(|comment| Comment {
                    body: comment.body,
                    creator: map_source_username(&comment.author),
                })
                .collect(),
            attachments,
        }
    }

    /// Returns true when the issue should stay open in the destination.
    ///
    /// Anything other than the exact source status `Open` closes the issue.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == OPEN_STATUS
    }
}
