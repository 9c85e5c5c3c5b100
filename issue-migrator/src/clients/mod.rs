//! Clients for the trackers on either side of a migration.
//!
//! The engine only talks to the [`SourceTracker`] and [`DestinationTracker`]
//! traits. [`JiraClient`] and [`GitLabClient`] implement them over HTTP using
//! a blocking `ureq` agent driven from tokio's blocking pool.

mod destination;
mod error;
mod gitlab;
mod http;
mod jira;
mod source;

pub use destination::{
    AccessLevel, Actor, DestinationIssue, DestinationProject, DestinationTracker, DestinationUser,
    NewIssue, NewUser, StateEvent, UploadedFile,
};
pub use error::ClientError;
pub use gitlab::GitLabClient;
pub use jira::JiraClient;
pub use source::{
    SourceAttachment, SourceComment, SourceIssue, SourceIssueSummary, SourceTracker, SourceUser,
};
