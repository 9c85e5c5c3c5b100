//! In-memory representation of a migrated project.
//!
//! A [`Project`] is built once from the source tracker and then only read,
//! apart from attaching the destination id and the provisioned users.

mod identity;
mod issue;

pub use identity::{map_source_username, UserIdentity, DESTINATION_ADMIN, SOURCE_ADMIN};
pub use issue::{Attachment, Comment, Issue, OPEN_STATUS};

/// A project snapshot plus what is known about its destination.
#[derive(Debug, Clone, Default)]
pub struct Project {
    /// Destination project id, once resolved.
    pub id: Option<u64>,

    /// Project name, used as the matching key in the destination.
    pub name: String,

    /// Issues in source search order.
    pub issues: Vec<Issue>,

    /// Identities referenced by the issues, in first-seen order.
    pub users: Vec<UserIdentity>,
}

impl Project {
    /// Creates an empty project with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns every distinct author username in first-seen order.
    ///
    /// Walks issue creators, comment authors and attachment authors.
    /// Assignees are not authors and are not included.
    #[must_use]
    pub fn author_usernames(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut authors = Vec::new();

        for issue in &self.issues {
            let names = std::iter::once(&issue.creator)
                .chain(issue.comments.iter().map(|comment| &comment.creator))
                .chain(issue.attachments.iter().map(|attachment| &attachment.creator));

            for name in names {
                if seen.insert(name.as_str()) {
                    authors.push(name.clone());
                }
            }
        }

        authors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn issue(creator: &str, commenters: &[&str], uploader: Option<&str>) -> Issue {
        Issue {
            source_id: "1".to_string(),
            key: "PRO-1".to_string(),
            title: "PRO-1:title".to_string(),
            description: String::new(),
            status: OPEN_STATUS.to_string(),
            creator: creator.to_string(),
            assignee: Some("zed".to_string()),
            created_at: Utc::now(),
            comments: commenters
                .iter()
                .map(|name| Comment {
                    body: "hi".to_string(),
                    creator: (*name).to_string(),
                })
                .collect(),
            attachments: uploader
                .map(|name| Attachment {
                    source_id: "9".to_string(),
                    filename: "a.txt".to_string(),
                    creator: name.to_string(),
                    staged_path: PathBuf::from("a.txt"),
                })
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn author_usernames_are_distinct_and_ordered() {
        let mut project = Project::new("PRO");
        project.issues = vec![
            issue("alice", &["bob", "alice"], Some("carol")),
            issue("bob", &["dave"], None),
        ];

        assert_eq!(
            project.author_usernames(),
            vec!["alice", "bob", "carol", "dave"]
        );
    }

    #[test]
    fn author_usernames_skip_assignees() {
        let mut project = Project::new("PRO");
        project.issues = vec![issue("alice", &[], None)];

        assert!(!project.author_usernames().contains(&"zed".to_string()));
    }
}
