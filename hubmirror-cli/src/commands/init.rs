//! `hubmirror init [--data-dir <dir>] [--backend files|sqlite] [--force]`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};

use hubmirror_core::{config, MirrorConfig, StoreBackend};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendArg {
    Files,
    Sqlite,
}

impl From<BackendArg> for StoreBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Files => StoreBackend::Files,
            BackendArg::Sqlite => StoreBackend::Sqlite,
        }
    }
}

/// Write a default configuration file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where mirrored data and source checkouts go. Relative paths are taken
    /// from the home directory.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Storage backend.
    #[arg(long, value_enum, default_value_t = BackendArg::Files)]
    pub backend: BackendArg,

    /// Also mirror the git repository of every synced project.
    #[arg(long)]
    pub source_code: bool,

    /// Overwrite an existing configuration.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let path = config::config_path_at(&home);
        if path.exists() && !self.force {
            bail!(
                "{} already exists; pass --force to overwrite it",
                path.display()
            );
        }

        let config = MirrorConfig {
            data_dir: self.data_dir,
            backend: self.backend.into(),
            download_source_code: self.source_code,
            ..MirrorConfig::default()
        };
        let written = config::save_at(&home, &config)
            .with_context(|| format!("failed to write {}", path.display()))?;

        println!("✓ Wrote {}", written.display());
        println!("  Data directory: {}", config.data_dir_at(&home).display());
        Ok(())
    }
}
