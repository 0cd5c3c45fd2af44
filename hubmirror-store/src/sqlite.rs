//! SQLite document backend.
//!
//! Entities are stored as JSON text keyed by `(project, category, key)`, with
//! a `full` column so a project can be rebuilt without parsing bodies. Every
//! statement runs in autocommit mode: a persisted entity is durable as soon as
//! `persist` returns.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use hubmirror_core::{Completeness, EntityCategory, Project, ProjectName, ProjectStats, Record};

use crate::backend::{ProjectStore, ProjectSummary};
use crate::error::{io_err, StoreError};

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    name TEXT PRIMARY KEY,
    info TEXT,
    stats TEXT,
    synced_at TEXT
);

CREATE TABLE IF NOT EXISTS entities (
    project TEXT NOT NULL,
    category TEXT NOT NULL,
    key TEXT NOT NULL,
    full INTEGER NOT NULL DEFAULT 0,
    body TEXT NOT NULL,
    PRIMARY KEY (project, category, key)
);
"#;

/// SQLite-backed store.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    sessions: Mutex<HashSet<ProjectName>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// In-memory database, for tests.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            sessions: Mutex::new(HashSet::new()),
        })
    }

    /// Read one stored entity body, if present.
    pub fn read_entity(
        &self,
        name: &ProjectName,
        category: EntityCategory,
        key: &str,
    ) -> Result<Option<Record>, StoreError> {
        let body: Option<String> = self
            .conn()
            .query_row(
                "SELECT body FROM entities WHERE project = ?1 AND category = ?2 AND key = ?3",
                params![name.as_str(), category.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sessions(&self) -> MutexGuard<'_, HashSet<ProjectName>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProjectStore for SqliteStore {
    fn project_exists(&self, name: &ProjectName) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM projects WHERE name = ?1",
                [name.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn open_session(&self, name: &ProjectName) -> Result<(), StoreError> {
        if !self.sessions().insert(name.clone()) {
            return Err(StoreError::SessionBusy { name: name.clone() });
        }
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO projects (name) VALUES (?1)",
            [name.as_str()],
        );
        if let Err(err) = inserted {
            self.release_session(name);
            return Err(err.into());
        }
        Ok(())
    }

    fn close_session(&self, name: &ProjectName, project: &Project) -> Result<(), StoreError> {
        let result = (|| -> Result<(), StoreError> {
            let info = project.info.as_ref().map(serde_json::to_string).transpose()?;
            let stats = project.stats.as_ref().map(serde_json::to_string).transpose()?;
            self.conn().execute(
                "INSERT INTO projects (name, info, stats, synced_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET
                    info = COALESCE(excluded.info, projects.info),
                    stats = COALESCE(excluded.stats, projects.stats),
                    synced_at = excluded.synced_at",
                params![name.as_str(), info, stats, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })();
        self.release_session(name);
        result
    }

    fn release_session(&self, name: &ProjectName) {
        self.sessions().remove(name);
    }

    fn load_project(&self, name: &ProjectName) -> Result<Project, StoreError> {
        let mut project = Project::new(name.clone());
        let conn = self.conn();

        let row: Option<(Option<String>, Option<String>)> = conn
            .query_row(
                "SELECT info, stats FROM projects WHERE name = ?1",
                [name.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if let Some((info, stats)) = row {
            project.info = info.map(|s| serde_json::from_str(&s)).transpose()?;
            project.stats = stats.map(|s| serde_json::from_str(&s)).transpose()?;
        }

        let mut stmt =
            conn.prepare("SELECT category, key, full FROM entities WHERE project = ?1")?;
        let rows = stmt.query_map([name.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;
        for row in rows {
            let (category, key, full) = row?;
            let Some(category) = EntityCategory::from_str_opt(&category) else {
                tracing::warn!("ignoring entity {key} of {name} in unknown category {category}");
                continue;
            };
            let completeness = if full {
                Completeness::Full
            } else {
                Completeness::Summary
            };
            project.mark(category, key, completeness);
        }
        Ok(project)
    }

    fn persist_info(&self, name: &ProjectName, info: &Value) -> Result<(), StoreError> {
        let info = serde_json::to_string(info)?;
        self.conn().execute(
            "INSERT INTO projects (name, info) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET info = excluded.info",
            params![name.as_str(), info],
        )?;
        Ok(())
    }

    fn persist_stats(&self, name: &ProjectName, stats: &ProjectStats) -> Result<(), StoreError> {
        let stats = serde_json::to_string(stats)?;
        self.conn().execute(
            "INSERT INTO projects (name, stats) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET stats = excluded.stats",
            params![name.as_str(), stats],
        )?;
        Ok(())
    }

    fn persist(
        &self,
        name: &ProjectName,
        category: EntityCategory,
        record: &Record,
    ) -> Result<(), StoreError> {
        let key = category.natural_key(record)?;
        let full = category.completeness(record) == Completeness::Full;
        let body = serde_json::to_string(record)?;
        // A summary body never replaces a full one.
        self.conn().execute(
            "INSERT INTO entities (project, category, key, full, body) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(project, category, key) DO UPDATE SET
                full = excluded.full,
                body = excluded.body
             WHERE excluded.full >= entities.full",
            params![name.as_str(), category.as_str(), key, full, body],
        )?;
        tracing::trace!("persisted {category} {key} of {name}");
        Ok(())
    }

    fn list_projects(&self) -> Result<Vec<ProjectSummary>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT name, stats, synced_at FROM projects ORDER BY name")?;
        let rows: Vec<(String, Option<String>, Option<String>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<_, _>>()?;

        let mut counts_stmt = conn.prepare(
            "SELECT category, COUNT(*) FROM entities WHERE project = ?1 GROUP BY category",
        )?;

        let mut summaries = Vec::new();
        for (name, stats, synced_at) in rows {
            let mut stored: BTreeMap<EntityCategory, usize> = EntityCategory::all()
                .iter()
                .map(|c| (*c, 0))
                .collect();
            let counts = counts_stmt.query_map([name.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for count in counts {
                let (category, n) = count?;
                if let Some(category) = EntityCategory::from_str_opt(&category) {
                    stored.insert(category, usize::try_from(n).unwrap_or(0));
                }
            }

            summaries.push(ProjectSummary {
                name: ProjectName::from(name),
                stats: stats.map(|s| serde_json::from_str(&s)).transpose()?,
                synced_at: synced_at
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|t| t.with_timezone(&Utc)),
                stored,
            });
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn name() -> ProjectName {
        ProjectName::from("acme_widget")
    }

    #[test]
    fn project_exists_after_open_session() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(!store.project_exists(&name()).unwrap());
        store.open_session(&name()).unwrap();
        assert!(store.project_exists(&name()).unwrap());
        assert!(matches!(
            store.open_session(&name()),
            Err(StoreError::SessionBusy { .. })
        ));
        store.release_session(&name());
    }

    #[test]
    fn persist_overwrites_by_natural_key() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .persist(&name(), EntityCategory::Issues, &json!({"number": 1, "title": "a"}))
            .unwrap();
        store
            .persist(&name(), EntityCategory::Issues, &json!({"number": 1, "title": "b"}))
            .unwrap();
        let body = store
            .read_entity(&name(), EntityCategory::Issues, "1")
            .unwrap()
            .unwrap();
        assert_eq!(body["title"], "b");
        assert_eq!(store.load_project(&name()).unwrap().count(EntityCategory::Issues), 1);
    }

    #[test]
    fn summary_never_replaces_full_body() {
        let store = SqliteStore::open_memory().unwrap();
        let full = json!({"sha": "abc", "files": [{"filename": "x"}]});
        store.persist(&name(), EntityCategory::Commits, &full).unwrap();
        store
            .persist(&name(), EntityCategory::Commits, &json!({"sha": "abc"}))
            .unwrap();
        let body = store
            .read_entity(&name(), EntityCategory::Commits, "abc")
            .unwrap()
            .unwrap();
        assert_eq!(body, full);
    }

    #[test]
    fn load_project_restores_info_stats_and_completeness() {
        let store = SqliteStore::open_memory().unwrap();
        store.open_session(&name()).unwrap();
        store.persist_info(&name(), &json!({"id": 1})).unwrap();
        store
            .persist_stats(
                &name(),
                &ProjectStats {
                    commits: 2,
                    ..ProjectStats::default()
                },
            )
            .unwrap();
        store
            .persist(&name(), EntityCategory::Commits, &json!({"sha": "a"}))
            .unwrap();
        store
            .persist(&name(), EntityCategory::Commits, &json!({"sha": "b", "files": []}))
            .unwrap();
        let snapshot = store.load_project(&name()).unwrap();
        store.close_session(&name(), &snapshot).unwrap();

        let project = store.load_project(&name()).unwrap();
        assert_eq!(project.info, Some(json!({"id": 1})));
        assert_eq!(project.stats.unwrap().commits, 2);
        let commits = project.known(EntityCategory::Commits).unwrap();
        assert_eq!(commits.completeness("a"), Some(Completeness::Summary));
        assert_eq!(commits.completeness("b"), Some(Completeness::Full));
    }

    #[test]
    fn list_projects_reports_counts_and_sync_time() {
        let store = SqliteStore::open_memory().unwrap();
        store.open_session(&name()).unwrap();
        store
            .persist(&name(), EntityCategory::Contributors, &json!({"id": 1}))
            .unwrap();
        store.close_session(&name(), &Project::new(name())).unwrap();

        let projects = store.list_projects().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].stored[&EntityCategory::Contributors], 1);
        assert_eq!(projects[0].stored[&EntityCategory::Issues], 0);
        assert!(projects[0].synced_at.is_some());
    }
}
