//! Jira REST v2 implementation of [`SourceTracker`].

use super::http::{blocking, build_agent, parse_base_url, read_json};
use super::{
    ClientError, SourceAttachment, SourceComment, SourceIssue, SourceIssueSummary, SourceTracker,
    SourceUser,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Read;
use tracing::debug;
use url::Url;

/// Fields requested when fetching a single issue.
const ISSUE_FIELDS: &str = "summary,description,status,creator,assignee,created,comment,attachment";

/// Jira client authenticating with HTTP basic auth.
#[derive(Clone)]
pub struct JiraClient {
    agent: ureq::Agent,
    base_url: Url,
    authorization: String,
}

impl JiraClient {
    /// Creates a client for the Jira instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Url`] if `base_url` is not a valid URL.
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self, ClientError> {
        let credentials = STANDARD.encode(format!("{username}:{password}"));
        Ok(Self {
            agent: build_agent(),
            base_url: parse_base_url(base_url)?,
            authorization: format!("Basic {credentials}"),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T>(&self, url: Url) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        debug!(url = %url, "GET");
        let agent = self.agent.clone();
        let authorization = self.authorization.clone();
        blocking(move || {
            let response = agent
                .request_url("GET", &url)
                .set("Authorization", &authorization)
                .set("Accept", "application/json")
                .call()?;
            read_json(response, &url)
        })
        .await
    }
}

#[async_trait]
impl SourceTracker for JiraClient {
    async fn search_issues(
        &self,
        project: &str,
        start_at: usize,
        max_results: usize,
    ) -> Result<Vec<SourceIssueSummary>, ClientError> {
        let mut url = self.endpoint("rest/api/2/search")?;
        url.query_pairs_mut()
            .append_pair("jql", &format!("project = \"{project}\" ORDER BY key ASC"))
            .append_pair("startAt", &start_at.to_string())
            .append_pair("maxResults", &max_results.to_string())
            .append_pair("fields", "summary");

        let page: RawSearchPage = self.get_json(url).await?;
        Ok(page
            .issues
            .into_iter()
            .map(|issue| SourceIssueSummary {
                id: issue.id,
                key: issue.key,
            })
            .collect())
    }

    async fn get_issue(&self, id: &str) -> Result<SourceIssue, ClientError> {
        let mut url = self.endpoint(&format!("rest/api/2/issue/{id}"))?;
        url.query_pairs_mut().append_pair("fields", ISSUE_FIELDS);

        let raw: RawIssue = self.get_json(url.clone()).await?;
        raw.into_source_issue().map_err(|message| ClientError::Decode {
            url: url.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, message),
        })
    }

    async fn find_user(&self, username: &str) -> Result<Option<SourceUser>, ClientError> {
        let mut url = self.endpoint("rest/api/2/user/search")?;
        url.query_pairs_mut().append_pair("username", username);

        let users: Vec<RawUser> = self.get_json(url).await?;
        Ok(pick_exact_user(users, username))
    }

    async fn download_attachment(&self, attachment_id: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.endpoint(&format!("secure/attachment/{attachment_id}/"))?;
        debug!(url = %url, "Downloading attachment");
        let agent = self.agent.clone();
        let authorization = self.authorization.clone();
        blocking(move || {
            let response = agent
                .request_url("GET", &url)
                .set("Authorization", &authorization)
                .call()?;
            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|source| ClientError::Decode {
                    url: url.to_string(),
                    source,
                })?;
            Ok(bytes)
        })
        .await
    }
}

/// Returns the single account whose username equals `username`.
fn pick_exact_user(users: Vec<RawUser>, username: &str) -> Option<SourceUser> {
    let mut matches = users.into_iter().filter(|user| user.name == username);
    let user = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(SourceUser {
        username: user.name,
        email: user.email_address,
        display_name: user.display_name,
    })
}

/// Parses Jira timestamps such as `2017-05-11T10:21:33.000+0200`.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
struct RawSearchPage {
    #[serde(default)]
    issues: Vec<RawSummary>,
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    id: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    id: String,
    key: String,
    fields: RawFields,
}

#[derive(Debug, Deserialize)]
struct RawFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: Option<String>,
    status: RawStatus,
    #[serde(default)]
    creator: Option<RawUserRef>,
    #[serde(default)]
    assignee: Option<RawUserRef>,
    created: String,
    #[serde(default)]
    comment: Option<RawCommentPage>,
    #[serde(default)]
    attachment: Vec<RawAttachment>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawUserRef {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawCommentPage {
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    author: Option<RawUserRef>,
}

#[derive(Debug, Deserialize)]
struct RawAttachment {
    id: String,
    filename: String,
    #[serde(default)]
    author: Option<RawUserRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    name: String,
    #[serde(default)]
    email_address: String,
    #[serde(default)]
    display_name: String,
}

fn user_name(user: Option<RawUserRef>) -> String {
    user.map(|user| user.name).unwrap_or_default()
}

impl RawIssue {
    fn into_source_issue(self) -> Result<SourceIssue, String> {
        let fields = self.fields;
        let created = parse_timestamp(&fields.created)
            .map_err(|e| format!("invalid created timestamp '{}': {e}", fields.created))?;

        Ok(SourceIssue {
            id: self.id,
            key: self.key,
            summary: fields.summary,
            description: fields.description.unwrap_or_default(),
            status: fields.status.name,
            creator: user_name(fields.creator),
            assignee: fields
                .assignee
                .map(|assignee| assignee.name)
                .filter(|name| !name.is_empty()),
            created,
            comments: fields
                .comment
                .map(|page| page.comments)
                .unwrap_or_default()
                .into_iter()
                .map(|comment| SourceComment {
                    id: comment.id,
                    body: comment.body,
                    author: user_name(comment.author),
                })
                .collect(),
            attachments: fields
                .attachment
                .into_iter()
                .map(|attachment| SourceAttachment {
                    id: attachment.id,
                    filename: attachment.filename,
                    author: user_name(attachment.author),
                })
                .collect(),
        })
    }
}
