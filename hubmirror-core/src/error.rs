//! Error types for hubmirror-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::entity::EntityCategory;

/// A repository address that cannot be turned into an owner/repo pair.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid repository address '{address}': expected .../<owner>/<repo>")]
    Invalid { address: String },
}

/// A remote record that does not carry what its category requires.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntityError {
    /// The natural key field is absent or has an unusable type.
    #[error("{category} record has no usable '{field}' field")]
    MissingKey {
        category: EntityCategory,
        field: &'static str,
    },
}

/// All errors that can arise from configuration load/save.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
