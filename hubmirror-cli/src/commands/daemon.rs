//! `hubmirror daemon` — sync trigger daemon lifecycle.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use hubmirror_daemon::paths::{socket_path, stderr_log_path, stdout_log_path};
use hubmirror_daemon::{request_status, request_stop, request_sync, start_blocking, DaemonError};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground.
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status,
    /// Print recent daemon log lines.
    Logs(DaemonLogsArgs),
    /// Ask the running daemon to sync one project and wait for the report.
    Trigger(TriggerArgs),
}

#[derive(Args, Debug)]
pub struct DaemonLogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,

    /// Show only the stderr log file.
    #[arg(long)]
    pub stderr_only: bool,
}

#[derive(Args, Debug)]
pub struct TriggerArgs {
    /// Repository address to sync.
    pub repo_url: String,

    /// API token forwarded with the request.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = super::home()?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let payload = match request_status(&home) {
                Ok(status) => status,
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
        }
        DaemonCommand::Logs(args) => {
            if !args.stderr_only {
                print_tail(&stdout_log_path(&home), args.lines)
                    .context("failed to read daemon stdout log")?;
            }
            print_tail(&stderr_log_path(&home), args.lines)
                .context("failed to read daemon stderr log")?;
        }
        DaemonCommand::Trigger(args) => {
            let token = args.token.filter(|t| !t.is_empty());
            let report = request_sync(&home, &args.repo_url, token)
                .with_context(|| format!("daemon sync failed for '{}'", args.repo_url))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render sync report")?
            );
        }
    }

    Ok(())
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    match tail_lines(path, lines)? {
        None => println!("log file not found: {}", path.display()),
        Some(tail) => {
            println!("==> {} <==", path.display());
            tail.iter().for_each(|line| println!("{line}"));
        }
    }
    Ok(())
}

/// Last `limit` lines of `path`, or `None` if the log was never written.
fn tail_lines(path: &Path, limit: usize) -> Result<Option<VecDeque<String>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("open {}", path.display())),
    };

    let mut tail = VecDeque::with_capacity(limit.min(1024));
    for line in BufReader::new(file).lines() {
        tail.push_back(line.with_context(|| format!("read {}", path.display()))?);
        if tail.len() > limit {
            tail.pop_front();
        }
    }
    Ok(Some(tail))
}
