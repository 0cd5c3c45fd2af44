//! In-memory view of one mirrored project.
//!
//! A [`Project`] is materialized from the store at the start of a sync and
//! tracks, per category, which natural keys are already persisted and in what
//! form. Entity bodies are not retained; the store stays authoritative.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::entity::{Completeness, EntityCategory};
use crate::error::EntityError;
use crate::types::{ProjectName, ProjectStats, Record};

/// Natural keys known for one category, with their completeness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownEntities(HashMap<String, Completeness>);

impl KnownEntities {
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn completeness(&self, key: &str) -> Option<Completeness> {
        self.0.get(key).copied()
    }

    /// Record `key` at `completeness`. Full entries are never downgraded.
    ///
    /// Returns the completeness stored after the call.
    pub fn record(&mut self, key: String, completeness: Completeness) -> Completeness {
        let slot = self.0.entry(key).or_insert(completeness);
        if completeness > *slot {
            *slot = completeness;
        }
        *slot
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn full_count(&self) -> usize {
        self.0.values().filter(|c| **c == Completeness::Full).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Completeness)> {
        self.0.iter().map(|(k, c)| (k.as_str(), *c))
    }
}

/// Root aggregate for one remote repository being mirrored.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: ProjectName,
    pub info: Option<Value>,
    pub stats: Option<ProjectStats>,
    known: BTreeMap<EntityCategory, KnownEntities>,
}

impl Project {
    /// Empty skeleton for a project the store has never seen.
    pub fn new(name: ProjectName) -> Self {
        Self {
            name,
            info: None,
            stats: None,
            known: BTreeMap::new(),
        }
    }

    pub fn set_info(&mut self, info: Value) {
        self.info = Some(info);
    }

    pub fn set_stats(&mut self, stats: ProjectStats) {
        self.stats = Some(stats);
    }

    pub fn known(&self, category: EntityCategory) -> Option<&KnownEntities> {
        self.known.get(&category)
    }

    /// Number of entities known in `category`.
    pub fn count(&self, category: EntityCategory) -> usize {
        self.known.get(&category).map_or(0, KnownEntities::len)
    }

    /// Does the project already hold this entity, in any form?
    pub fn entity_exists(
        &self,
        category: EntityCategory,
        record: &Record,
    ) -> Result<bool, EntityError> {
        let key = category.natural_key(record)?;
        Ok(self.known.get(&category).is_some_and(|k| k.contains(&key)))
    }

    /// Does the project already hold this entity in full form?
    pub fn full_entity_exists(
        &self,
        category: EntityCategory,
        record: &Record,
    ) -> Result<bool, EntityError> {
        let key = category.natural_key(record)?;
        Ok(self
            .known
            .get(&category)
            .and_then(|k| k.completeness(&key))
            == Some(Completeness::Full))
    }

    /// Add (or upgrade) `record`, judging its completeness from its body.
    pub fn add(
        &mut self,
        category: EntityCategory,
        record: &Record,
    ) -> Result<Completeness, EntityError> {
        let key = category.natural_key(record)?;
        Ok(self.mark(category, key, category.completeness(record)))
    }

    /// Record a key directly; used by stores rebuilding a project from disk.
    pub fn mark(
        &mut self,
        category: EntityCategory,
        key: String,
        completeness: Completeness,
    ) -> Completeness {
        self.known
            .entry(category)
            .or_default()
            .record(key, completeness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project() -> Project {
        Project::new(ProjectName::from("acme_widget"))
    }

    #[test]
    fn new_project_knows_nothing() {
        let p = project();
        let issue = json!({"number": 1});
        assert!(!p.entity_exists(EntityCategory::Issues, &issue).unwrap());
        assert!(!p.full_entity_exists(EntityCategory::Issues, &issue).unwrap());
        assert_eq!(p.count(EntityCategory::Issues), 0);
    }

    #[test]
    fn add_summary_then_upgrade_to_full() {
        let mut p = project();
        let summary = json!({"number": 7, "state": "closed"});
        assert_eq!(p.add(EntityCategory::Issues, &summary).unwrap(), Completeness::Summary);
        assert!(p.entity_exists(EntityCategory::Issues, &summary).unwrap());
        assert!(!p.full_entity_exists(EntityCategory::Issues, &summary).unwrap());

        let full = json!({"number": 7, "state": "closed", "closed_by": {"login": "a"}});
        assert_eq!(p.add(EntityCategory::Issues, &full).unwrap(), Completeness::Full);
        assert!(p.full_entity_exists(EntityCategory::Issues, &summary).unwrap());
    }

    #[test]
    fn full_is_never_downgraded() {
        let mut p = project();
        let full = json!({"sha": "abc", "files": []});
        p.add(EntityCategory::Commits, &full).unwrap();
        let summary = json!({"sha": "abc"});
        assert_eq!(p.add(EntityCategory::Commits, &summary).unwrap(), Completeness::Full);
        assert_eq!(p.known(EntityCategory::Commits).unwrap().full_count(), 1);
    }

    #[test]
    fn categories_are_independent() {
        let mut p = project();
        p.add(EntityCategory::IssueComments, &json!({"id": 1})).unwrap();
        assert!(!p
            .entity_exists(EntityCategory::CommitComments, &json!({"id": 1}))
            .unwrap());
    }

    #[test]
    fn malformed_record_is_reported() {
        let mut p = project();
        assert!(p.add(EntityCategory::Issues, &json!({"title": "x"})).is_err());
        assert!(p.entity_exists(EntityCategory::Issues, &json!({})).is_err());
    }
}
