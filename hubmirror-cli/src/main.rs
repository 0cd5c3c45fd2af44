//! hubmirror: incremental mirror of GitHub project metadata.
//!
//! # Usage
//!
//! ```text
//! hubmirror init [--data-dir <dir>] [--backend files|sqlite] [--force]
//! hubmirror sync <address|batch-file> [--token <t>] [--jobs <n>]
//! hubmirror status [--json]
//! hubmirror daemon start|stop|status|logs|trigger
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonCommand, init::InitArgs, status::StatusArgs, sync::SyncArgs};

#[derive(Parser, Debug)]
#[command(
    name = "hubmirror",
    version,
    about = "Incrementally mirror GitHub issues, commits and contributors",
    long_about = None,
)]
struct Cli {
    /// Log every record as it is processed.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration to ~/.hubmirror/config.yaml.
    Init(InitArgs),

    /// Mirror one project, or every project listed in a batch file.
    Sync(SyncArgs),

    /// Show the projects held in the local store.
    Status(StatusArgs),

    /// Run or talk to the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => {
            init_tracing(cli.verbose);
            args.run(cli.verbose)
        }
        Commands::Status(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}

/// Library log records go to stderr; `RUST_LOG` overrides the level.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
