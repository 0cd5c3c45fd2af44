//! Domain types shared by every hubmirror crate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityCategory;

/// A remote record as returned by the hosting API.
///
/// Records stay untyped JSON: only the natural key and the full-form marker
/// matter to reconciliation, everything else is mirrored verbatim.
pub type Record = serde_json::Value;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Local name of a mirrored project, e.g. `acme_widget`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectName(pub String);

impl ProjectName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Per-category totals reported by the remote, used to size progress output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub issues: u64,
    pub issue_comments: u64,
    pub issue_events: u64,
    pub commits: u64,
    pub commit_comments: u64,
    pub contributors: u64,
}

impl ProjectStats {
    pub fn get(&self, category: EntityCategory) -> u64 {
        match category {
            EntityCategory::Issues => self.issues,
            EntityCategory::IssueComments => self.issue_comments,
            EntityCategory::IssueEvents => self.issue_events,
            EntityCategory::Commits => self.commits,
            EntityCategory::CommitComments => self.commit_comments,
            EntityCategory::Contributors => self.contributors,
        }
    }

    pub fn set(&mut self, category: EntityCategory, count: u64) {
        let slot = match category {
            EntityCategory::Issues => &mut self.issues,
            EntityCategory::IssueComments => &mut self.issue_comments,
            EntityCategory::IssueEvents => &mut self.issue_events,
            EntityCategory::Commits => &mut self.commits,
            EntityCategory::CommitComments => &mut self.commit_comments,
            EntityCategory::Contributors => &mut self.contributors,
        };
        *slot = count;
    }

    pub fn total(&self) -> u64 {
        self.issues
            + self.issue_comments
            + self.issue_events
            + self.commits
            + self.commit_comments
            + self.contributors
    }
}
