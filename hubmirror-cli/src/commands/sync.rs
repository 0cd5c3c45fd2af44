//! `hubmirror sync` — mirror one project or a batch file of projects.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use rayon::prelude::*;

use hubmirror_core::{MirrorConfig, RepoAddress};
use hubmirror_store::ProjectStore;
use hubmirror_sync::{pipeline, Credentials, SourceAction, SyncError, SyncOutcome};

/// Arguments for `hubmirror sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// A repository address (`https://github.com/acme/widget`, `acme/widget`)
    /// or a file listing one address per line.
    pub target: String,

    /// API token, also used for cloning over https.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Projects synced in parallel from a batch file.
    #[arg(long, short = 'j', default_value_t = 1)]
    pub jobs: usize,
}

impl SyncArgs {
    pub fn run(self, verbose: bool) -> Result<()> {
        let home = super::home()?;
        let mut config = super::load_config(&home)?;
        config.verbose |= verbose;
        let store = super::open_store(&home, &config)?;
        let credentials = Credentials {
            token: self.token.filter(|t| !t.is_empty()),
        };

        let batch = Path::new(&self.target);
        if batch.is_file() {
            return run_batch(&home, &config, store.as_ref(), batch, &credentials, self.jobs);
        }

        let outcome = pipeline::run(&home, &config, store.as_ref(), &self.target, &credentials)
            .with_context(|| format!("sync failed for '{}'", self.target))?;
        print_outcome(&outcome);
        Ok(())
    }
}

fn run_batch(
    home: &Path,
    config: &MirrorConfig,
    store: &dyn ProjectStore,
    batch: &Path,
    credentials: &Credentials,
    jobs: usize,
) -> Result<()> {
    let addresses = pipeline::read_batch_file(batch)
        .with_context(|| format!("failed to read batch file {}", batch.display()))?;
    let (planned, rejected) = pipeline::plan_batch(&addresses);
    for err in &rejected {
        eprintln!("{} {err}", "✗".red());
    }
    if planned.is_empty() {
        println!("No addresses to sync in {}.", batch.display());
        return Ok(());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("failed to start sync worker pool")?;
    let results: Vec<(&RepoAddress, Result<SyncOutcome, SyncError>)> = pool.install(|| {
        planned
            .par_iter()
            .map(|address| {
                let result = pipeline::run(home, config, store, address.as_str(), credentials);
                (address, result)
            })
            .collect()
    });

    let mut failed = rejected.len();
    for (address, result) in &results {
        match result {
            Ok(outcome) => print_outcome(outcome),
            Err(err) => {
                failed += 1;
                eprintln!("{} '{}' failed: {err}", "✗".red(), address.project_name());
            }
        }
    }

    let total = results.len() + rejected.len();
    if failed > 0 {
        bail!("{failed} of {total} projects failed");
    }
    println!("All {total} projects synced.");
    Ok(())
}

fn print_outcome(outcome: &SyncOutcome) {
    let report = match outcome {
        SyncOutcome::Skipped { name } => {
            println!("{} '{name}' already mirrored, skipped", "·".bright_black());
            return;
        }
        SyncOutcome::Synced(report) => report,
    };

    println!(
        "{} '{}' synced ({} written in {})",
        "✓".green(),
        report.name,
        report.written(),
        format_millis(report.elapsed_ms)
    );
    for pass in &report.categories {
        println!(
            "  {:<16} {:>6} listed {:>6} new {:>6} upgraded {:>6} unchanged",
            pass.category.as_str(),
            pass.seen,
            pass.created,
            pass.upgraded,
            pass.skipped
        );
    }
    match report.source {
        Some(SourceAction::Cloned) => println!("  source code      cloned"),
        Some(SourceAction::Pulled) => println!("  source code      pulled"),
        None => {}
    }
}

fn format_millis(ms: u64) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", ms as f64 / 1_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_are_humanized() {
        assert_eq!(format_millis(250), "250ms");
        assert_eq!(format_millis(1_500), "1.5s");
    }
}
