//! GitLab REST v4 implementation of [`DestinationTracker`].

use super::http::{blocking, build_agent, parse_base_url, read_json};
use super::{
    AccessLevel, Actor, ClientError, DestinationIssue, DestinationProject, DestinationTracker,
    DestinationUser, NewIssue, NewUser, StateEvent, UploadedFile,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use url::Url;

/// Page size for search endpoints.
const PER_PAGE: usize = 100;

/// Response header naming the next page of a paginated listing.
const NEXT_PAGE_HEADER: &str = "X-Next-Page";

/// Feeds upload boundaries so two uploads never share one.
static UPLOAD_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// GitLab client authenticating with a private token.
///
/// The token must belong to an administrator for [`Actor::User`]
/// impersonation (`Sudo` header) and user creation to work.
#[derive(Clone)]
pub struct GitLabClient {
    agent: ureq::Agent,
    api_url: Url,
    token: String,
}

impl GitLabClient {
    /// Creates a client for the GitLab instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Url`] if `base_url` is not a valid URL.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ClientError> {
        let api_url = parse_base_url(base_url)?.join("api/v4/")?;
        Ok(Self {
            agent: build_agent(),
            api_url,
            token: token.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.api_url.join(path)?)
    }

    fn request(&self, method: &str, url: &Url, actor: &Actor) -> ureq::Request {
        let request = self
            .agent
            .request_url(method, url)
            .set("PRIVATE-TOKEN", &self.token);
        match actor {
            Actor::Service => request,
            Actor::User(username) => request.set("Sudo", username),
        }
    }

    async fn get_json<T>(&self, url: Url) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        debug!(url = %url, "GET");
        let request = self.request("GET", &url, &Actor::Service);
        blocking(move || read_json(request.call()?, &url)).await
    }

    /// Fetches every page of a listing endpoint.
    async fn get_all_pages<T>(&self, url: Url) -> Result<Vec<T>, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut page_url = url.clone();
            page_url
                .query_pairs_mut()
                .append_pair("page", &page.to_string())
                .append_pair("per_page", &PER_PAGE.to_string());
            debug!(url = %page_url, page, "GET");

            let request = self.request("GET", &page_url, &Actor::Service);
            let (batch, next_header) = blocking(move || {
                let response = request.call()?;
                let next = response.header(NEXT_PAGE_HEADER).map(str::to_string);
                let batch: Vec<T> = read_json(response, &page_url)?;
                Ok((batch, next))
            })
            .await?;

            let received = batch.len();
            items.extend(batch);
            match next_page(next_header.as_deref(), page, received) {
                Some(next) => page = next,
                None => return Ok(items),
            }
        }
    }

    async fn send_json<T>(
        &self,
        method: &'static str,
        url: Url,
        body: Value,
        actor: &Actor,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        debug!(url = %url, method, "Sending");
        let request = self.request(method, &url, actor);
        blocking(move || read_json(request.send_json(body)?, &url)).await
    }
}

#[async_trait]
impl DestinationTracker for GitLabClient {
    async fn search_projects(&self, name: &str) -> Result<Vec<DestinationProject>, ClientError> {
        let mut url = self.endpoint("projects")?;
        url.query_pairs_mut().append_pair("search", name);

        let projects: Vec<RawProject> = self.get_all_pages(url).await?;
        Ok(projects.into_iter().map(Into::into).collect())
    }

    async fn create_project(
        &self,
        name: &str,
        visibility: &str,
    ) -> Result<DestinationProject, ClientError> {
        let url = self.endpoint("projects")?;
        let body = json!({ "name": name, "visibility": visibility });
        let project: RawProject = self.send_json("POST", url, body, &Actor::Service).await?;
        Ok(project.into())
    }

    async fn search_users(&self, username: &str) -> Result<Vec<DestinationUser>, ClientError> {
        let mut url = self.endpoint("users")?;
        url.query_pairs_mut().append_pair("username", username);

        let users: Vec<RawUser> = self.get_json(url).await?;
        Ok(users.into_iter().map(Into::into).collect())
    }

    async fn create_user(&self, user: &NewUser) -> Result<DestinationUser, ClientError> {
        let url = self.endpoint("users")?;
        let body = json!({
            "email": user.email,
            "username": user.username,
            "name": user.name,
            "password": user.password,
            "admin": user.admin,
            "skip_confirmation": true,
        });
        let created: RawUser = self.send_json("POST", url, body, &Actor::Service).await?;
        Ok(created.into())
    }

    async fn add_project_member(
        &self,
        project_id: u64,
        user_id: u64,
        access: AccessLevel,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("projects/{project_id}/members"))?;
        let body = json!({ "user_id": user_id, "access_level": access.as_u32() });
        let _: Value = self.send_json("POST", url, body, &Actor::Service).await?;
        Ok(())
    }

    async fn search_issues(
        &self,
        project_id: u64,
        title: &str,
    ) -> Result<Vec<DestinationIssue>, ClientError> {
        let mut url = self.endpoint(&format!("projects/{project_id}/issues"))?;
        url.query_pairs_mut()
            .append_pair("search", title)
            .append_pair("in", "title");

        let issues: Vec<RawIssue> = self.get_all_pages(url).await?;
        Ok(issues.into_iter().map(Into::into).collect())
    }

    async fn create_issue(
        &self,
        project_id: u64,
        issue: &NewIssue,
        actor: &Actor,
    ) -> Result<DestinationIssue, ClientError> {
        let url = self.endpoint(&format!("projects/{project_id}/issues"))?;
        let body = json!({
            "title": issue.title,
            "description": issue.description,
            "assignee_ids": issue.assignee_ids,
            "labels": issue.labels.join(","),
            "created_at": issue.created_at.to_rfc3339(),
        });
        let created: RawIssue = self.send_json("POST", url, body, actor).await?;
        Ok(created.into())
    }

    async fn update_issue_state(
        &self,
        project_id: u64,
        issue_iid: u64,
        event: StateEvent,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("projects/{project_id}/issues/{issue_iid}"))?;
        let body = json!({ "state_event": event.as_str() });
        let _: Value = self.send_json("PUT", url, body, &Actor::Service).await?;
        Ok(())
    }

    async fn create_note(
        &self,
        project_id: u64,
        issue_iid: u64,
        body: &str,
        actor: &Actor,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("projects/{project_id}/issues/{issue_iid}/notes"))?;
        let _: Value = self
            .send_json("POST", url, json!({ "body": body }), actor)
            .await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        project_id: u64,
        path: &Path,
    ) -> Result<UploadedFile, ClientError> {
        let url = self.endpoint(&format!("projects/{project_id}/uploads"))?;
        debug!(url = %url, path = %path.display(), "Uploading file");
        let request = self.request("POST", &url, &Actor::Service);
        let path: PathBuf = path.to_path_buf();

        blocking(move || {
            let bytes = std::fs::read(&path).map_err(|source| ClientError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string());

            let boundary = multipart_boundary(&bytes, random_boundary);
            let body = multipart_body(&boundary, &filename, &bytes);
            let request = request.set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            );
            let upload: RawUpload = read_json(request.send_bytes(&body)?, &url)?;
            Ok(UploadedFile {
                markdown: upload.markdown,
                url: upload.url,
            })
        })
        .await
    }
}

/// Picks the page after `current`, or `None` once the listing is exhausted.
///
/// An empty `X-Next-Page` marks the last page. Without the header (GitLab
/// drops it for very large result sets) a full page means there may be more.
fn next_page(header: Option<&str>, current: u32, received: usize) -> Option<u32> {
    match header.map(str::trim) {
        Some("") => None,
        Some(value) => value.parse().ok().filter(|&next| next > current),
        None if received >= PER_PAGE => Some(current + 1),
        None => None,
    }
}

/// Draws candidates until one does not occur inside the file bytes.
fn multipart_boundary(bytes: &[u8], mut candidate: impl FnMut() -> String) -> String {
    loop {
        let boundary = candidate();
        let needle = boundary.as_bytes();
        if !bytes.windows(needle.len()).any(|window| window == needle) {
            return boundary;
        }
    }
}

fn random_boundary() -> String {
    let mut hasher = RandomState::new().build_hasher();
    UPLOAD_SEQUENCE
        .fetch_add(1, Ordering::Relaxed)
        .hash(&mut hasher);
    format!("----issue-migrator-{:016x}", hasher.finish())
}

/// Encodes a single `file` form field as a multipart body.
fn multipart_body(boundary: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let filename = filename.replace('"', "%22");
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[derive(Debug, Deserialize)]
struct RawProject {
    id: u64,
    name: String,
}

impl From<RawProject> for DestinationProject {
    fn from(raw: RawProject) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: u64,
    username: String,
    #[serde(default)]
    name: String,
}

impl From<RawUser> for DestinationUser {
    fn from(raw: RawUser) -> Self {
        Self {
            id: raw.id,
            username: raw.username,
            name: raw.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    iid: u64,
    title: String,
}

impl From<RawIssue> for DestinationIssue {
    fn from(raw: RawIssue) -> Self {
        Self {
            iid: raw.iid,
            title: raw.title,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawUpload {
    url: String,
    markdown: String,
}
