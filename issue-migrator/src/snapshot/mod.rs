//! Snapshot construction from the source tracker.
//!
//! The whole project is materialized (including attachment bytes, staged on
//! disk) before anything is written to the destination, so source failures
//! never interleave with destination writes.

mod error;
mod staging;

pub use error::SnapshotError;
pub use staging::StagingDir;

use crate::clients::{SourceIssue, SourceIssueSummary, SourceTracker};
use crate::project::{map_source_username, Attachment, Issue, Project};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Search page size used against the source tracker.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Tuning for [`build_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// Results requested per search page. A shorter page ends pagination.
    pub page_size: usize,

    /// Stop after this many issues.
    pub limit: Option<usize>,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            limit: None,
        }
    }
}

/// A best-effort copy of a source project.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The materialized project.
    pub project: Project,

    /// Issues and attachments that could not be read and were left out.
    pub errors: usize,
}

/// Reads every issue of `project_name` from the source tracker.
///
/// Individual issue or attachment failures are logged, counted in
/// [`Snapshot::errors`] and skipped without retry.
///
/// # Errors
///
/// Returns [`SnapshotError::Search`] if any search page fails.
pub async fn build_snapshot(
    source: &dyn SourceTracker,
    project_name: &str,
    staging: &StagingDir,
    options: &SnapshotOptions,
) -> Result<Snapshot, SnapshotError> {
    let span = info_span!("snapshot", project = %project_name);

    async {
        info!("Collecting issues from source");
        let summaries = collect_summaries(source, project_name, options).await?;
        info!(count = summaries.len(), "Found issues");

        let mut project = Project::new(project_name);
        let mut errors = 0;

        for summary in summaries {
            match source.get_issue(&summary.id).await {
                Ok(issue) => {
                    let (attachments, failed) = stage_attachments(source, &issue, staging).await;
                    errors += failed;
                    debug!(
                        issue = %summary.key,
                        comments = issue.comments.len(),
                        attachments = attachments.len(),
                        "Read issue"
                    );
                    project.issues.push(Issue::from_source(issue, attachments));
                }
                Err(e) => {
                    error!(issue = %summary.key, error = %e, "Failed to fetch issue");
                    errors += 1;
                }
            }
        }

        if errors > 0 {
            warn!(errors, "Encountered errors while reading project from source");
        }

        Ok(Snapshot { project, errors })
    }
    .instrument(span)
    .await
}

/// Pages through the issue search until a short page or the limit.
async fn collect_summaries(
    source: &dyn SourceTracker,
    project_name: &str,
    options: &SnapshotOptions,
) -> Result<Vec<SourceIssueSummary>, SnapshotError> {
    let page_size = options.page_size.max(1);
    let mut summaries = Vec::new();
    let mut start_at = 0;

    loop {
        debug!(start_at, page_size, "Fetching search page");
        let page = source
            .search_issues(project_name, start_at, page_size)
            .await
            .map_err(|source| SnapshotError::Search {
                project: project_name.to_string(),
                start_at,
                source,
            })?;

        let received = page.len();
        summaries.extend(page);

        if let Some(limit) = options.limit {
            if summaries.len() >= limit {
                summaries.truncate(limit);
                break;
            }
        }

        if received < page_size {
            break;
        }
        start_at += page_size;
    }

    Ok(summaries)
}

/// Downloads and stages every attachment of an issue.
///
/// Returns the staged attachments and the number that failed.
async fn stage_attachments(
    source: &dyn SourceTracker,
    issue: &SourceIssue,
    staging: &StagingDir,
) -> (Vec<Attachment>, usize) {
    let mut staged = Vec::with_capacity(issue.attachments.len());
    let mut failed = 0;

    for attachment in &issue.attachments {
        let bytes = match source.download_attachment(&attachment.id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(
                    issue = %issue.key,
                    attachment = %attachment.id,
                    error = %e,
                    "Failed to download attachment"
                );
                failed += 1;
                continue;
            }
        };

        match staging.stage(&attachment.id, &attachment.filename, &bytes) {
            Ok(path) => {
                debug!(attachment = %attachment.id, path = %path.display(), "Staged attachment");
                staged.push(Attachment {
                    source_id: attachment.id.clone(),
                    filename: attachment.filename.clone(),
                    creator: map_source_username(&attachment.author),
                    staged_path: path,
                });
            }
            Err(e) => {
                error!(
                    issue = %issue.key,
                    attachment = %attachment.id,
                    error = %e,
                    "Failed to stage attachment"
                );
                failed += 1;
            }
        }
    }

    (staged, failed)
}
