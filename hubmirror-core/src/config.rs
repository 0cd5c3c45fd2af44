//! Mirror configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.hubmirror/
//!   config.yaml    (this file — optional; every key has a default)
//!   data/          (default `data_dir`)
//! ```
//!
//! Like the rest of the crate, every function that touches the filesystem has
//! an `_at(home, …)` form taking an explicit home directory and a thin wrapper
//! that resolves the home with `dirs::home_dir()`. Tests use the `_at` forms.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entity::EntityCategory;
use crate::error::{io_err, ConfigError};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Persistence backend selected by `backend:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One JSON file per entity under `data_dir`.
    #[default]
    Files,
    /// A single SQLite document database under `data_dir`.
    Sqlite,
}

/// Options read by the sync orchestrator, the CLI and the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Root of the store and of the source mirrors. Relative paths are taken
    /// from the home directory; `None` means `~/.hubmirror/data`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub backend: StoreBackend,
    pub api_base_url: String,
    pub git_executable: PathBuf,
    pub verbose: bool,

    /// Resume projects already in the store instead of skipping them.
    pub update_existing_repos: bool,

    pub download_issues: bool,
    pub download_issue_comments: bool,
    pub download_issue_events: bool,
    pub download_commits: bool,
    pub download_commit_comments: bool,
    pub download_contributors: bool,

    /// Fetch the single-resource form of every issue.
    pub download_issues_full: bool,
    /// Fetch the single-resource form of every commit.
    pub download_commits_full: bool,

    pub download_source_code: bool,

    /// Upper bound on concurrent project syncs in the daemon.
    pub max_parallel_syncs: usize,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            backend: StoreBackend::Files,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            git_executable: PathBuf::from("git"),
            verbose: false,
            update_existing_repos: true,
            download_issues: true,
            download_issue_comments: true,
            download_issue_events: true,
            download_commits: true,
            download_commit_comments: true,
            download_contributors: true,
            download_issues_full: false,
            download_commits_full: false,
            download_source_code: false,
            max_parallel_syncs: 4,
        }
    }
}

impl MirrorConfig {
    /// Is the reconciliation pass for `category` enabled?
    pub fn downloads(&self, category: EntityCategory) -> bool {
        match category {
            EntityCategory::Issues => self.download_issues,
            EntityCategory::IssueComments => self.download_issue_comments,
            EntityCategory::IssueEvents => self.download_issue_events,
            EntityCategory::Commits => self.download_commits,
            EntityCategory::CommitComments => self.download_commit_comments,
            EntityCategory::Contributors => self.download_contributors,
        }
    }

    /// `full_required` for `category`. Always false for categories without a
    /// full form.
    pub fn full_required(&self, category: EntityCategory) -> bool {
        match category {
            EntityCategory::Issues => self.download_issues_full,
            EntityCategory::Commits => self.download_commits_full,
            _ => false,
        }
    }

    /// Resolved data directory for a given home.
    pub fn data_dir_at(&self, home: &Path) -> PathBuf {
        match &self.data_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => home.join(dir),
            None => hubmirror_root(home).join("data"),
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.hubmirror`
pub fn hubmirror_root(home: &Path) -> PathBuf {
    home.join(".hubmirror")
}

/// `<home>/.hubmirror/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    hubmirror_root(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the configuration, falling back to defaults when the file is absent.
pub fn load_at(home: &Path) -> Result<MirrorConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(MirrorConfig::default());
    }
    load_file(&path)
}

/// Load the configuration from an explicit file.
pub fn load_file(path: &Path) -> Result<MirrorConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(MirrorConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<MirrorConfig, ConfigError> {
    load_at(&home()?)
}

/// Atomically save the configuration: `.yaml.tmp` sibling, then rename.
pub fn save_at(home: &Path, config: &MirrorConfig) -> Result<PathBuf, ConfigError> {
    let dir = hubmirror_root(home);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let path = config_path_at(home);
    let tmp = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

pub(crate) fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
