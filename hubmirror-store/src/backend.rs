//! The store contract shared by every backend.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use hubmirror_core::{
    EntityCategory, MirrorConfig, Project, ProjectName, ProjectStats, Record, StoreBackend,
};

use crate::error::StoreError;
use crate::files::FileStore;
use crate::sqlite::SqliteStore;

/// File name of the SQLite database inside `data_dir`.
pub const SQLITE_FILE: &str = "hubmirror.db";

/// Sink for mirrored projects, keyed by project name and entity natural key.
///
/// Every `persist*` call is durable on return; `close_session` is where the
/// project snapshot (info, stats, sync time) is committed and the session is
/// released. Implementations synchronize internally and are shared between
/// threads.
pub trait ProjectStore: Send + Sync {
    fn project_exists(&self, name: &ProjectName) -> Result<bool, StoreError>;

    /// Claim the write session for `name`. Fails with
    /// [`StoreError::SessionBusy`] if one is already open.
    fn open_session(&self, name: &ProjectName) -> Result<(), StoreError>;

    /// Commit `project` and release the session. The session is released even
    /// when the commit fails.
    fn close_session(&self, name: &ProjectName, project: &Project) -> Result<(), StoreError>;

    /// Release the session without committing anything.
    fn release_session(&self, name: &ProjectName);

    /// Rebuild the project from persisted state; an empty skeleton if absent.
    fn load_project(&self, name: &ProjectName) -> Result<Project, StoreError>;

    fn persist_info(&self, name: &ProjectName, info: &Value) -> Result<(), StoreError>;

    fn persist_stats(&self, name: &ProjectName, stats: &ProjectStats) -> Result<(), StoreError>;

    /// Append-or-overwrite `record` under its natural key. Idempotent.
    fn persist(
        &self,
        name: &ProjectName,
        category: EntityCategory,
        record: &Record,
    ) -> Result<(), StoreError>;

    /// Every project in the store, sorted by name.
    fn list_projects(&self) -> Result<Vec<ProjectSummary>, StoreError>;
}

/// What `status` shows for one stored project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub name: ProjectName,
    pub stats: Option<ProjectStats>,
    pub synced_at: Option<DateTime<Utc>>,
    /// Entities actually persisted, per category.
    pub stored: BTreeMap<EntityCategory, usize>,
}

impl ProjectSummary {
    pub fn stored_total(&self) -> usize {
        self.stored.values().sum()
    }
}

/// Open the backend selected by `config` for the given home directory.
pub fn open_backend(
    config: &MirrorConfig,
    home: &Path,
) -> Result<Box<dyn ProjectStore>, StoreError> {
    let data_dir = config.data_dir_at(home);
    match config.backend {
        StoreBackend::Files => {
            tracing::debug!("using file store at {}", data_dir.display());
            Ok(Box::new(FileStore::new(data_dir)))
        }
        StoreBackend::Sqlite => {
            let path = data_dir.join(SQLITE_FILE);
            tracing::debug!("using sqlite store at {}", path.display());
            Ok(Box::new(SqliteStore::open(&path)?))
        }
    }
}
