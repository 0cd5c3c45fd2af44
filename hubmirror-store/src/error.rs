//! Error types for hubmirror-store.

use std::path::PathBuf;

use thiserror::Error;

use hubmirror_core::{EntityError, ProjectName};

/// All errors that can arise from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (manifests and entity bodies).
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite backend failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A second write session was requested for a project that has one open.
    #[error("a write session is already open for project '{name}'")]
    SessionBusy { name: ProjectName },

    /// A natural key that cannot be used as a storage key.
    #[error("unusable entity key '{key}'")]
    InvalidKey { key: String },

    /// The record handed to `persist` has no natural key.
    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
