//! Shared plumbing for the blocking HTTP clients.

use super::ClientError;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Per-request timeout applied to both trackers.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Builds the agent shared by all requests of one client.
pub(crate) fn build_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(concat!("issue-migrator/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Parses a base URL so that relative API paths join underneath it.
///
/// `https://host/jira` and `https://host/jira/` both become `https://host/jira/`.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Runs a blocking request closure on tokio's blocking pool.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ClientError>
where
    F: FnOnce() -> Result<T, ClientError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Decodes a JSON response body.
pub(crate) fn read_json<T: DeserializeOwned>(
    response: ureq::Response,
    url: &Url,
) -> Result<T, ClientError> {
    response.into_json::<T>().map_err(|source| ClientError::Decode {
        url: url.to_string(),
        source,
    })
}
