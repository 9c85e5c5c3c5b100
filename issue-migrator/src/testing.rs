//! In-memory trackers for tests.
//!
//! Both implementations keep their state behind a mutex so tests can seed
//! data, inject faults and inspect what the engine wrote while the engine
//! holds a shared reference.

use crate::clients::{
    AccessLevel, Actor, ClientError, DestinationIssue, DestinationProject, DestinationTracker,
    DestinationUser, NewIssue, NewUser, SourceAttachment, SourceComment, SourceIssue,
    SourceIssueSummary, SourceTracker, SourceUser, StateEvent, UploadedFile,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn rejected(status: u16, message: impl Into<String>) -> ClientError {
    ClientError::Status {
        status,
        url: "memory://tracker".to_string(),
        message: message.into(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed creation time used by [`sample_issue`].
#[must_use]
pub fn sample_created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 6, 1, 9, 30, 0)
        .single()
        .unwrap_or_default()
}

/// An open issue created by `alice` with no comments or attachments.
#[must_use]
pub fn sample_issue(id: &str, key: &str, summary: &str) -> SourceIssue {
    SourceIssue {
        id: id.to_string(),
        key: key.to_string(),
        summary: summary.to_string(),
        description: format!("Description of {key}"),
        status: "Open".to_string(),
        creator: "alice".to_string(),
        assignee: None,
        created: sample_created_at(),
        comments: Vec::new(),
        attachments: Vec::new(),
    }
}

/// A comment for [`SourceIssue::comments`].
#[must_use]
pub fn sample_comment(id: &str, author: &str, body: &str) -> SourceComment {
    SourceComment {
        id: id.to_string(),
        body: body.to_string(),
        author: author.to_string(),
    }
}

/// Attachment metadata for [`SourceIssue::attachments`].
#[must_use]
pub fn sample_attachment(id: &str, author: &str, filename: &str) -> SourceAttachment {
    SourceAttachment {
        id: id.to_string(),
        filename: filename.to_string(),
        author: author.to_string(),
    }
}

#[derive(Debug, Default)]
struct SourceState {
    issues: Vec<SourceIssue>,
    users: Vec<SourceUser>,
    attachments: HashMap<String, Vec<u8>>,
    failing_issues: HashSet<String>,
    failing_attachments: HashSet<String>,
    fail_search: bool,
    searches: Vec<(usize, usize)>,
}

/// A source tracker backed by vectors.
#[derive(Debug, Default)]
pub struct InMemorySource {
    state: Mutex<SourceState>,
}

impl InMemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an issue, returned by searches in insertion order.
    pub fn add_issue(&self, issue: SourceIssue) {
        lock(&self.state).issues.push(issue);
    }

    /// Adds a user with a derived email and display name.
    pub fn add_user(&self, username: &str) {
        lock(&self.state).users.push(SourceUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            display_name: format!("User {username}"),
        });
    }

    /// Registers the bytes served for an attachment id.
    pub fn add_attachment_bytes(&self, attachment_id: &str, bytes: &[u8]) {
        lock(&self.state)
            .attachments
            .insert(attachment_id.to_string(), bytes.to_vec());
    }

    /// Makes fetching the given issue fail.
    pub fn fail_issue(&self, issue_id: &str) {
        lock(&self.state).failing_issues.insert(issue_id.to_string());
    }

    /// Makes downloading the given attachment fail.
    pub fn fail_attachment(&self, attachment_id: &str) {
        lock(&self.state)
            .failing_attachments
            .insert(attachment_id.to_string());
    }

    /// Makes every search fail as if authentication was rejected.
    pub fn fail_search(&self) {
        lock(&self.state).fail_search = true;
    }

    /// The `(start_at, max_results)` of every search call.
    #[must_use]
    pub fn searches(&self) -> Vec<(usize, usize)> {
        lock(&self.state).searches.clone()
    }
}

#[async_trait]
impl SourceTracker for InMemorySource {
    async fn search_issues(
        &self,
        _project: &str,
        start_at: usize,
        max_results: usize,
    ) -> Result<Vec<SourceIssueSummary>, ClientError> {
        let mut state = lock(&self.state);
        state.searches.push((start_at, max_results));
        if state.fail_search {
            return Err(rejected(401, "Unauthorized"));
        }

        Ok(state
            .issues
            .iter()
            .skip(start_at)
            .take(max_results)
            .map(|issue| SourceIssueSummary {
                id: issue.id.clone(),
                key: issue.key.clone(),
            })
            .collect())
    }

    async fn get_issue(&self, id: &str) -> Result<SourceIssue, ClientError> {
        let state = lock(&self.state);
        if state.failing_issues.contains(id) {
            return Err(rejected(500, format!("issue {id} unavailable")));
        }
        state
            .issues
            .iter()
            .find(|issue| issue.id == id)
            .cloned()
            .ok_or_else(|| rejected(404, format!("issue {id} not found")))
    }

    async fn find_user(&self, username: &str) -> Result<Option<SourceUser>, ClientError> {
        let state = lock(&self.state);
        let mut matches = state.users.iter().filter(|user| user.username == username);
        let user = matches.next().cloned();
        if matches.next().is_some() {
            return Ok(None);
        }
        Ok(user)
    }

    async fn download_attachment(&self, attachment_id: &str) -> Result<Vec<u8>, ClientError> {
        let state = lock(&self.state);
        if state.failing_attachments.contains(attachment_id) {
            return Err(rejected(500, format!("attachment {attachment_id} unavailable")));
        }
        state
            .attachments
            .get(attachment_id)
            .cloned()
            .ok_or_else(|| rejected(404, format!("attachment {attachment_id} not found")))
    }
}

/// A note recorded by [`InMemoryDestination`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNote {
    pub body: String,
    pub author: Actor,
}

/// An issue recorded by [`InMemoryDestination`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredIssue {
    pub project_id: u64,
    pub iid: u64,
    pub title: String,
    pub description: String,
    pub assignee_ids: Vec<u64>,
    pub labels: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub author: Actor,
    pub notes: Vec<StoredNote>,
    pub closed: bool,
}

#[derive(Debug, Default)]
struct DestinationState {
    next_id: u64,
    projects: Vec<DestinationProject>,
    users: Vec<DestinationUser>,
    created_users: Vec<NewUser>,
    members: Vec<(u64, u64, AccessLevel)>,
    issues: Vec<StoredIssue>,
    uploads: Vec<String>,
    user_searches: usize,
    create_issue_attempts: HashMap<String, usize>,
    failing_titles: HashSet<String>,
    failing_note_marker: Option<String>,
    fail_uploads: bool,
    fail_close: bool,
    fail_user_creation: bool,
    fail_project_search: bool,
}

impl DestinationState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_mut(&mut self, project_id: u64, iid: u64) -> Result<&mut StoredIssue, ClientError> {
        self.issues
            .iter_mut()
            .find(|issue| issue.project_id == project_id && issue.iid == iid)
            .ok_or_else(|| rejected(404, format!("issue {iid} not found")))
    }
}

/// A destination tracker backed by vectors.
#[derive(Debug, Default)]
pub struct InMemoryDestination {
    state: Mutex<DestinationState>,
}

impl InMemoryDestination {
    /// Creates an empty destination.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a project and returns its id.
    pub fn add_project(&self, name: &str) -> u64 {
        let mut state = lock(&self.state);
        let id = state.allocate_id();
        state.projects.push(DestinationProject {
            id,
            name: name.to_string(),
        });
        id
    }

    /// Adds a user account. Adding the same name twice makes it ambiguous.
    pub fn add_user(&self, username: &str) -> DestinationUser {
        let mut state = lock(&self.state);
        let user = DestinationUser {
            id: state.allocate_id(),
            username: username.to_string(),
            name: username.to_string(),
        };
        state.users.push(user.clone());
        user
    }

    /// Adds an issue that already exists before the run.
    pub fn add_issue(&self, project_id: u64, title: &str) {
        let mut state = lock(&self.state);
        let iid = state
            .issues
            .iter()
            .filter(|issue| issue.project_id == project_id)
            .count() as u64
            + 1;
        state.issues.push(StoredIssue {
            project_id,
            iid,
            title: title.to_string(),
            description: String::new(),
            assignee_ids: Vec::new(),
            labels: Vec::new(),
            created_at: None,
            author: Actor::Service,
            notes: Vec::new(),
            closed: false,
        });
    }

    /// Makes every attempt to create an issue with this title fail.
    pub fn fail_create_issue(&self, title: &str) {
        lock(&self.state).failing_titles.insert(title.to_string());
    }

    /// Makes note creation fail whenever the body contains `marker`.
    pub fn fail_notes_containing(&self, marker: &str) {
        lock(&self.state).failing_note_marker = Some(marker.to_string());
    }

    /// Makes every upload fail.
    pub fn fail_uploads(&self) {
        lock(&self.state).fail_uploads = true;
    }

    /// Makes every state transition fail.
    pub fn fail_close(&self) {
        lock(&self.state).fail_close = true;
    }

    /// Makes every user creation fail.
    pub fn fail_user_creation(&self) {
        lock(&self.state).fail_user_creation = true;
    }

    /// Makes every project search fail.
    pub fn fail_project_search(&self) {
        lock(&self.state).fail_project_search = true;
    }

    /// All projects, including ones created during the run.
    #[must_use]
    pub fn projects(&self) -> Vec<DestinationProject> {
        lock(&self.state).projects.clone()
    }

    /// All issues, including pre-existing ones.
    #[must_use]
    pub fn issues(&self) -> Vec<StoredIssue> {
        lock(&self.state).issues.clone()
    }

    /// Users created through [`DestinationTracker::create_user`].
    #[must_use]
    pub fn created_users(&self) -> Vec<NewUser> {
        lock(&self.state).created_users.clone()
    }

    /// `(project_id, user_id, access)` of every membership.
    #[must_use]
    pub fn members(&self) -> Vec<(u64, u64, AccessLevel)> {
        lock(&self.state).members.clone()
    }

    /// File names uploaded so far.
    #[must_use]
    pub fn uploads(&self) -> Vec<String> {
        lock(&self.state).uploads.clone()
    }

    /// Number of user searches served.
    #[must_use]
    pub fn user_searches(&self) -> usize {
        lock(&self.state).user_searches
    }

    /// Number of create attempts made for a title.
    #[must_use]
    pub fn create_issue_attempts(&self, title: &str) -> usize {
        lock(&self.state)
            .create_issue_attempts
            .get(title)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl DestinationTracker for InMemoryDestination {
    async fn search_projects(&self, name: &str) -> Result<Vec<DestinationProject>, ClientError> {
        let state = lock(&self.state);
        if state.fail_project_search {
            return Err(rejected(503, "Service Unavailable"));
        }
        Ok(state
            .projects
            .iter()
            .filter(|project| project.name.contains(name))
            .cloned()
            .collect())
    }

    async fn create_project(
        &self,
        name: &str,
        _visibility: &str,
    ) -> Result<DestinationProject, ClientError> {
        let mut state = lock(&self.state);
        let project = DestinationProject {
            id: state.allocate_id(),
            name: name.to_string(),
        };
        state.projects.push(project.clone());
        Ok(project)
    }

    async fn search_users(&self, username: &str) -> Result<Vec<DestinationUser>, ClientError> {
        let mut state = lock(&self.state);
        state.user_searches += 1;
        Ok(state
            .users
            .iter()
            .filter(|user| user.username == username)
            .cloned()
            .collect())
    }

    async fn create_user(&self, user: &NewUser) -> Result<DestinationUser, ClientError> {
        let mut state = lock(&self.state);
        if state.fail_user_creation {
            return Err(rejected(500, "user creation failed"));
        }
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(rejected(409, "Username has already been taken"));
        }
        let created = DestinationUser {
            id: state.allocate_id(),
            username: user.username.clone(),
            name: user.name.clone(),
        };
        state.users.push(created.clone());
        state.created_users.push(user.clone());
        Ok(created)
    }

    async fn add_project_member(
        &self,
        project_id: u64,
        user_id: u64,
        access: AccessLevel,
    ) -> Result<(), ClientError> {
        let mut state = lock(&self.state);
        if state
            .members
            .iter()
            .any(|(project, user, _)| *project == project_id && *user == user_id)
        {
            return Err(rejected(409, "Member already exists"));
        }
        state.members.push((project_id, user_id, access));
        Ok(())
    }

    async fn search_issues(
        &self,
        project_id: u64,
        title: &str,
    ) -> Result<Vec<DestinationIssue>, ClientError> {
        let state = lock(&self.state);
        Ok(state
            .issues
            .iter()
            .filter(|issue| issue.project_id == project_id && issue.title.contains(title))
            .map(|issue| DestinationIssue {
                iid: issue.iid,
                title: issue.title.clone(),
            })
            .collect())
    }

    async fn create_issue(
        &self,
        project_id: u64,
        issue: &NewIssue,
        actor: &Actor,
    ) -> Result<DestinationIssue, ClientError> {
        let mut state = lock(&self.state);
        *state
            .create_issue_attempts
            .entry(issue.title.clone())
            .or_default() += 1;
        if state.failing_titles.contains(&issue.title) {
            return Err(rejected(500, "Internal Server Error"));
        }

        let iid = state
            .issues
            .iter()
            .filter(|stored| stored.project_id == project_id)
            .count() as u64
            + 1;
        state.issues.push(StoredIssue {
            project_id,
            iid,
            title: issue.title.clone(),
            description: issue.description.clone(),
            assignee_ids: issue.assignee_ids.clone(),
            labels: issue.labels.clone(),
            created_at: Some(issue.created_at),
            author: actor.clone(),
            notes: Vec::new(),
            closed: false,
        });
        Ok(DestinationIssue {
            iid,
            title: issue.title.clone(),
        })
    }

    async fn update_issue_state(
        &self,
        project_id: u64,
        issue_iid: u64,
        event: StateEvent,
    ) -> Result<(), ClientError> {
        let mut state = lock(&self.state);
        if state.fail_close {
            return Err(rejected(500, "state transition failed"));
        }
        state.issue_mut(project_id, issue_iid)?.closed = event == StateEvent::Close;
        Ok(())
    }

    async fn create_note(
        &self,
        project_id: u64,
        issue_iid: u64,
        body: &str,
        actor: &Actor,
    ) -> Result<(), ClientError> {
        let mut state = lock(&self.state);
        if let Some(marker) = &state.failing_note_marker {
            if body.contains(marker.as_str()) {
                return Err(rejected(500, "note creation failed"));
            }
        }
        state.issue_mut(project_id, issue_iid)?.notes.push(StoredNote {
            body: body.to_string(),
            author: actor.clone(),
        });
        Ok(())
    }

    async fn upload_file(
        &self,
        project_id: u64,
        path: &Path,
    ) -> Result<UploadedFile, ClientError> {
        let mut state = lock(&self.state);
        if state.fail_uploads {
            return Err(rejected(413, "Request Entity Too Large"));
        }
        std::fs::metadata(path).map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let slot = state.uploads.len();
        state.uploads.push(name.clone());
        let url = format!("/uploads/{project_id}-{slot}/{name}");
        Ok(UploadedFile {
            markdown: format!("[{name}]({url})"),
            url,
        })
    }
}
