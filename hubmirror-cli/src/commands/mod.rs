pub mod daemon;
pub mod init;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hubmirror_core::{config, MirrorConfig};
use hubmirror_store::{open_backend, ProjectStore};

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub(crate) fn load_config(home: &Path) -> Result<MirrorConfig> {
    config::load_at(home)
        .with_context(|| format!("failed to load {}", config::config_path_at(home).display()))
}

pub(crate) fn open_store(home: &Path, config: &MirrorConfig) -> Result<Box<dyn ProjectStore>> {
    open_backend(config, home).with_context(|| {
        format!(
            "failed to open the {:?} store at {}",
            config.backend,
            config.data_dir_at(home).display()
        )
    })
}
