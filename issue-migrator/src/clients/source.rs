//! Read-only interface to the tracker issues are migrated from.

use super::ClientError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One hit from a paginated issue search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIssueSummary {
    /// Internal numeric id, as a string.
    pub id: String,
    /// Human facing key such as `PRO-12`.
    pub key: String,
}

/// A fully fetched source issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIssue {
    pub id: String,
    pub key: String,
    pub summary: String,
    pub description: String,
    /// Workflow status name, e.g. `Open` or `In Progress`.
    pub status: String,
    pub creator: String,
    pub assignee: Option<String>,
    pub created: DateTime<Utc>,
    pub comments: Vec<SourceComment>,
    pub attachments: Vec<SourceAttachment>,
}

/// A comment on a source issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceComment {
    pub id: String,
    pub body: String,
    pub author: String,
}

/// Attachment metadata on a source issue. The bytes are fetched separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAttachment {
    pub id: String,
    pub filename: String,
    pub author: String,
}

/// Profile details of a source user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUser {
    pub username: String,
    pub email: String,
    pub display_name: String,
}

/// The tracker issues are read from.
#[async_trait]
pub trait SourceTracker: Send + Sync {
    /// Returns one page of issues belonging to `project`.
    async fn search_issues(
        &self,
        project: &str,
        start_at: usize,
        max_results: usize,
    ) -> Result<Vec<SourceIssueSummary>, ClientError>;

    /// Fetches an issue with its comments and attachment metadata.
    async fn get_issue(&self, id: &str) -> Result<SourceIssue, ClientError>;

    /// Looks up a user by exact username.
    ///
    /// Returns `None` both when nobody matches and when several accounts
    /// match; an ambiguous answer is never trusted.
    async fn find_user(&self, username: &str) -> Result<Option<SourceUser>, ClientError>;

    /// Downloads the raw bytes of an attachment.
    async fn download_attachment(&self, attachment_id: &str) -> Result<Vec<u8>, ClientError>;
}
