//! Error types for hubmirror-sync.

use std::path::PathBuf;

use thiserror::Error;

use hubmirror_core::{AddressError, EntityError};
use hubmirror_store::StoreError;

/// Failures talking to the remote hosting API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport failure or a non-404 error status.
    #[error("remote unavailable at {address}: {reason}")]
    Unavailable { address: String, reason: String },

    #[error("remote resource not found: {address}")]
    NotFound { address: String },

    /// The response body was not the JSON shape we asked for.
    #[error("cannot decode response from {address}: {reason}")]
    Decode { address: String, reason: String },
}

/// Failures running the version-control mirror.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// All errors that can end a project sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("vcs error: {0}")]
    Vcs(#[from] VcsError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A remote record lacked its natural key.
    #[error("malformed record: {0}")]
    MalformedRecord(#[from] EntityError),

    /// An I/O error, with annotated path for context (batch files).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
