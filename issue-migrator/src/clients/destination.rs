//! Read/write interface to the tracker issues are migrated into.

use super::ClientError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

/// A project in the destination tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationProject {
    pub id: u64,
    pub name: String,
}

/// A user account in the destination tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationUser {
    pub id: u64,
    pub username: String,
    pub name: String,
}

/// Parameters for creating a destination user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password: String,
    /// Administrators can be impersonated by the migration token.
    pub admin: bool,
}

/// Project membership level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Developer,
    Maintainer,
}

impl AccessLevel {
    /// Numeric access level understood by the GitLab API.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Developer => 30,
            Self::Maintainer => 40,
        }
    }
}

/// An issue in the destination tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationIssue {
    /// Project scoped issue number.
    pub iid: u64,
    pub title: String,
}

/// Parameters for creating a destination issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub assignee_ids: Vec<u64>,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// State transition applied to an existing issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    Close,
    Reopen,
}

impl StateEvent {
    /// Wire representation of the event.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Reopen => "reopen",
        }
    }
}

/// The identity a write is recorded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// The account owning the API token.
    Service,
    /// Impersonate the named user for this single write.
    User(String),
}

/// Result of uploading a file to a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Markdown snippet that links or embeds the upload.
    pub markdown: String,
    pub url: String,
}

/// The tracker issues are written to.
#[async_trait]
pub trait DestinationTracker: Send + Sync {
    /// Searches projects by name. Matching may be fuzzy.
    async fn search_projects(&self, name: &str) -> Result<Vec<DestinationProject>, ClientError>;

    /// Creates a project with the given visibility (`public`, `internal`, `private`).
    async fn create_project(
        &self,
        name: &str,
        visibility: &str,
    ) -> Result<DestinationProject, ClientError>;

    /// Searches users by username.
    async fn search_users(&self, username: &str) -> Result<Vec<DestinationUser>, ClientError>;

    /// Creates a user account.
    async fn create_user(&self, user: &NewUser) -> Result<DestinationUser, ClientError>;

    /// Adds a user to a project.
    ///
    /// An existing membership surfaces as a `409` [`ClientError::Status`].
    async fn add_project_member(
        &self,
        project_id: u64,
        user_id: u64,
        access: AccessLevel,
    ) -> Result<(), ClientError>;

    /// Searches a project's issues by title. Matching may be fuzzy.
    async fn search_issues(
        &self,
        project_id: u64,
        title: &str,
    ) -> Result<Vec<DestinationIssue>, ClientError>;

    /// Creates an issue recorded as authored by `actor`.
    async fn create_issue(
        &self,
        project_id: u64,
        issue: &NewIssue,
        actor: &Actor,
    ) -> Result<DestinationIssue, ClientError>;

    /// Applies a state transition to an issue.
    async fn update_issue_state(
        &self,
        project_id: u64,
        issue_iid: u64,
        event: StateEvent,
    ) -> Result<(), ClientError>;

    /// Adds a note to an issue recorded as authored by `actor`.
    async fn create_note(
        &self,
        project_id: u64,
        issue_iid: u64,
        body: &str,
        actor: &Actor,
    ) -> Result<(), ClientError>;

    /// Uploads a local file into the project's upload area.
    async fn upload_file(&self, project_id: u64, path: &Path)
        -> Result<UploadedFile, ClientError>;
}
