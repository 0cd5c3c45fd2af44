//! Entity categories and the predicates reconciliation is built on.
//!
//! Every mirrored record belongs to one [`EntityCategory`], is identified by a
//! natural key taken from its body, and (for issues and commits) is either in
//! summary form or full form. Full form is recognized by a marker field that
//! only the single-resource representation carries.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EntityError;
use crate::types::Record;

/// The six kinds of entity mirrored per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Issues,
    IssueComments,
    IssueEvents,
    Commits,
    CommitComments,
    Contributors,
}

/// Whether a stored entity is the listing representation or the full one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Summary,
    Full,
}

impl EntityCategory {
    /// All categories in sync order.
    pub fn all() -> &'static [EntityCategory] {
        &[
            EntityCategory::Issues,
            EntityCategory::IssueComments,
            EntityCategory::IssueEvents,
            EntityCategory::Commits,
            EntityCategory::CommitComments,
            EntityCategory::Contributors,
        ]
    }

    /// Stable snake_case identifier, used for directory and table keys.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityCategory::Issues => "issues",
            EntityCategory::IssueComments => "issue_comments",
            EntityCategory::IssueEvents => "issue_events",
            EntityCategory::Commits => "commits",
            EntityCategory::CommitComments => "commit_comments",
            EntityCategory::Contributors => "contributors",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.as_str() == s)
    }

    /// Path of the listing endpoint relative to the repository API address.
    pub fn remote_path(self) -> &'static str {
        match self {
            EntityCategory::Issues => "issues",
            EntityCategory::IssueComments => "issues/comments",
            EntityCategory::IssueEvents => "issues/events",
            EntityCategory::Commits => "commits",
            EntityCategory::CommitComments => "comments",
            EntityCategory::Contributors => "contributors",
        }
    }

    /// Query filters applied to the listing and the count query.
    pub fn remote_filters(self) -> &'static [&'static str] {
        match self {
            EntityCategory::Issues => &["state=all"],
            _ => &[],
        }
    }

    /// Field holding the natural key.
    pub fn key_field(self) -> &'static str {
        match self {
            EntityCategory::Issues => "number",
            EntityCategory::Commits => "sha",
            _ => "id",
        }
    }

    /// Field whose presence marks the full form, for categories that have one.
    pub fn full_marker(self) -> Option<&'static str> {
        match self {
            EntityCategory::Issues => Some("closed_by"),
            EntityCategory::Commits => Some("files"),
            _ => None,
        }
    }

    pub fn has_full_form(self) -> bool {
        self.full_marker().is_some()
    }

    /// Extract the natural key of `record`.
    pub fn natural_key(self, record: &Record) -> Result<String, EntityError> {
        let field = self.key_field();
        match record.get(field) {
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            _ => Err(EntityError::MissingKey {
                category: self,
                field,
            }),
        }
    }

    /// Completeness of `record` as judged by its body alone.
    ///
    /// Categories without a full form are always [`Completeness::Full`]:
    /// there is nothing left to upgrade.
    pub fn completeness(self, record: &Record) -> Completeness {
        match self.full_marker() {
            Some(marker) if record.get(marker).is_none() => Completeness::Summary,
            _ => Completeness::Full,
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().replace('_', " "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn issue_key_is_number() {
        let issue = json!({"number": 42, "id": 9001});
        assert_eq!(EntityCategory::Issues.natural_key(&issue).unwrap(), "42");
    }

    #[test]
    fn commit_key_is_sha() {
        let commit = json!({"sha": "abc123"});
        assert_eq!(EntityCategory::Commits.natural_key(&commit).unwrap(), "abc123");
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = EntityCategory::Contributors
            .natural_key(&json!({"login": "octocat"}))
            .unwrap_err();
        assert_eq!(
            err,
            EntityError::MissingKey {
                category: EntityCategory::Contributors,
                field: "id"
            }
        );
        assert!(err.to_string().contains("contributors"));
    }

    #[test]
    fn empty_string_key_is_rejected() {
        assert!(EntityCategory::Commits.natural_key(&json!({"sha": ""})).is_err());
    }

    #[test]
    fn null_closed_by_still_counts_as_full() {
        let issue = json!({"number": 1, "closed_by": null});
        assert_eq!(EntityCategory::Issues.completeness(&issue), Completeness::Full);
        let summary = json!({"number": 1});
        assert_eq!(EntityCategory::Issues.completeness(&summary), Completeness::Summary);
    }

    #[test]
    fn commit_full_form_has_files() {
        let full = json!({"sha": "a", "files": []});
        let summary = json!({"sha": "a", "commit": {}});
        assert_eq!(EntityCategory::Commits.completeness(&full), Completeness::Full);
        assert_eq!(EntityCategory::Commits.completeness(&summary), Completeness::Summary);
    }

    #[test]
    fn categories_without_full_form_are_always_full() {
        let comment = json!({"id": 5});
        assert_eq!(
            EntityCategory::IssueComments.completeness(&comment),
            Completeness::Full
        );
        assert!(!EntityCategory::IssueComments.has_full_form());
    }

    #[test]
    fn as_str_roundtrips() {
        for category in EntityCategory::all() {
            assert_eq!(EntityCategory::from_str_opt(category.as_str()), Some(*category));
        }
        assert_eq!(EntityCategory::from_str_opt("pulls"), None);
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(EntityCategory::IssueComments.to_string(), "issue comments");
    }
}
