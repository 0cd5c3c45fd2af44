//! Flat-file backend.
//!
//! # Layout
//!
//! ```text
//! <data_dir>/
//!   <project>/
//!     project.json              (manifest: name, info, stats, synced_at)
//!     issues/<number>.json
//!     issue_comments/<id>.json
//!     issue_events/<id>.json
//!     commits/<sha>.json
//!     commit_comments/<id>.json
//!     contributors/<id>.json
//!     sourcecode/               (VCS mirror, not managed here)
//! ```
//!
//! Every file is written to a `.json.tmp` sibling and renamed into place, so a
//! killed process leaves either the old body or the new one. Knowledge of what
//! is stored is rebuilt from the entity files on load; the manifest is not
//! needed to resume.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hubmirror_core::{EntityCategory, Project, ProjectName, ProjectStats, Record};

use crate::backend::{ProjectStore, ProjectSummary};
use crate::error::{io_err, StoreError};

pub const MANIFEST_FILE: &str = "project.json";

/// On-disk project manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectManifest {
    pub name: ProjectName,
    #[serde(default)]
    pub info: Option<Value>,
    #[serde(default)]
    pub stats: Option<ProjectStats>,
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl ProjectManifest {
    fn empty(name: &ProjectName) -> Self {
        Self {
            name: name.clone(),
            info: None,
            stats: None,
            synced_at: None,
        }
    }
}

/// Store rooted at a data directory, one JSON file per entity.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    sessions: Mutex<HashSet<ProjectName>>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sessions: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<project>/`
    pub fn project_dir(&self, name: &ProjectName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// `<root>/<project>/project.json`
    pub fn manifest_path(&self, name: &ProjectName) -> PathBuf {
        self.project_dir(name).join(MANIFEST_FILE)
    }

    /// `<root>/<project>/<category>/`
    pub fn category_dir(&self, name: &ProjectName, category: EntityCategory) -> PathBuf {
        self.project_dir(name).join(category.as_str())
    }

    /// `<root>/<project>/<category>/<key>.json`
    pub fn entity_path(
        &self,
        name: &ProjectName,
        category: EntityCategory,
        key: &str,
    ) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.category_dir(name, category).join(format!("{key}.json")))
    }

    /// Read one stored entity body, if present.
    pub fn read_entity(
        &self,
        name: &ProjectName,
        category: EntityCategory,
        key: &str,
    ) -> Result<Option<Record>, StoreError> {
        let path = self.entity_path(name, category, key)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Read the manifest, if the project has one.
    pub fn read_manifest(&self, name: &ProjectName) -> Result<Option<ProjectManifest>, StoreError> {
        let path = self.manifest_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn update_manifest(
        &self,
        name: &ProjectName,
        f: impl FnOnce(&mut ProjectManifest),
    ) -> Result<(), StoreError> {
        let mut manifest = self
            .read_manifest(name)?
            .unwrap_or_else(|| ProjectManifest::empty(name));
        f(&mut manifest);
        write_json_atomic(&self.manifest_path(name), &serde_json::to_value(&manifest)?)
    }

    /// Keys of every entity file in one category directory, sorted.
    fn entity_keys(
        &self,
        name: &ProjectName,
        category: EntityCategory,
    ) -> Result<Vec<String>, StoreError> {
        let dir = self.category_dir(name, category);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err(&dir, err)),
        };
        let mut keys: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let file_name = e.file_name().to_string_lossy().into_owned();
                file_name.strip_suffix(".json").map(str::to_owned)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashSet<ProjectName>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProjectStore for FileStore {
    fn project_exists(&self, name: &ProjectName) -> Result<bool, StoreError> {
        Ok(self.manifest_path(name).exists())
    }

    fn open_session(&self, name: &ProjectName) -> Result<(), StoreError> {
        if !self.sessions().insert(name.clone()) {
            return Err(StoreError::SessionBusy { name: name.clone() });
        }
        let dir = self.project_dir(name);
        let prepared = std::fs::create_dir_all(&dir)
            .map_err(|e| io_err(&dir, e))
            .and_then(|()| match self.project_exists(name)? {
                true => Ok(()),
                false => self.update_manifest(name, |_| {}),
            });
        if prepared.is_err() {
            self.release_session(name);
        }
        prepared
    }

    fn close_session(&self, name: &ProjectName, project: &Project) -> Result<(), StoreError> {
        let result = self.update_manifest(name, |manifest| {
            if project.info.is_some() {
                manifest.info = project.info.clone();
            }
            if project.stats.is_some() {
                manifest.stats = project.stats;
            }
            manifest.synced_at = Some(Utc::now());
        });
        self.release_session(name);
        result
    }

    fn release_session(&self, name: &ProjectName) {
        self.sessions().remove(name);
    }

    fn load_project(&self, name: &ProjectName) -> Result<Project, StoreError> {
        let mut project = Project::new(name.clone());
        if let Some(manifest) = self.read_manifest(name)? {
            project.info = manifest.info;
            project.stats = manifest.stats;
        }

        for category in EntityCategory::all().iter().copied() {
            for key in self.entity_keys(name, category)? {
                match self.read_entity(name, category, &key) {
                    Ok(Some(record)) => {
                        project.mark(category, key, category.completeness(&record));
                    }
                    Ok(None) => {}
                    Err(err) => {
                        // Unreadable bodies are left for the next pass to rewrite.
                        tracing::warn!(
                            "skipping unreadable {category} entity {key} of {name}: {err}"
                        );
                    }
                }
            }
        }
        Ok(project)
    }

    fn persist_info(&self, name: &ProjectName, info: &Value) -> Result<(), StoreError> {
        self.update_manifest(name, |manifest| manifest.info = Some(info.clone()))
    }

    fn persist_stats(&self, name: &ProjectName, stats: &ProjectStats) -> Result<(), StoreError> {
        self.update_manifest(name, |manifest| manifest.stats = Some(*stats))
    }

    fn persist(
        &self,
        name: &ProjectName,
        category: EntityCategory,
        record: &Record,
    ) -> Result<(), StoreError> {
        let key = category.natural_key(record)?;
        let path = self.entity_path(name, category, &key)?;
        write_json_atomic(&path, record)?;
        tracing::trace!("persisted {category} {key} of {name}");
        Ok(())
    }

    fn list_projects(&self) -> Result<Vec<ProjectSummary>, StoreError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err(&self.root, err)),
        };

        let mut names: Vec<ProjectName> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| ProjectName::from(e.file_name().to_string_lossy().into_owned()))
            .collect();
        names.sort();

        let mut summaries = Vec::new();
        for name in names {
            let Some(manifest) = self.read_manifest(&name)? else {
                continue;
            };
            let mut stored = BTreeMap::new();
            for category in EntityCategory::all().iter().copied() {
                stored.insert(category, self.entity_keys(&name, category)?.len());
            }
            summaries.push(ProjectSummary {
                name,
                stats: manifest.stats,
                synced_at: manifest.synced_at,
                stored,
            });
        }
        Ok(summaries)
    }
}

/// Keys become file names; refuse anything that could escape the directory.
fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\']) {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Write `value` to `path` via a `.json.tmp` sibling and rename.
fn write_json_atomic(path: &Path, value: &Value) -> Result<(), StoreError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid store path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
