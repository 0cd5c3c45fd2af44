//! `hubmirror status` — what the local store holds.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use hubmirror_core::{EntityCategory, StoreBackend};
use hubmirror_store::ProjectSummary;

/// Arguments for `hubmirror status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let config = super::load_config(&home)?;
        let store = super::open_store(&home, &config)?;
        let projects = store
            .list_projects()
            .context("failed to list stored projects")?;
        let data_dir = config.data_dir_at(&home).display().to_string();

        if self.json {
            let payload = StatusJson {
                backend: config.backend,
                data_dir,
                projects,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(config.backend, &data_dir, &projects);
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson {
    backend: StoreBackend,
    data_dir: String,
    projects: Vec<ProjectSummary>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "project")]
    project: String,
    #[tabled(rename = "issues")]
    issues: String,
    #[tabled(rename = "issue comments")]
    issue_comments: String,
    #[tabled(rename = "issue events")]
    issue_events: String,
    #[tabled(rename = "commits")]
    commits: String,
    #[tabled(rename = "commit comments")]
    commit_comments: String,
    #[tabled(rename = "contributors")]
    contributors: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
}

fn print_table(backend: StoreBackend, data_dir: &str, projects: &[ProjectSummary]) {
    let records: usize = projects.iter().map(ProjectSummary::stored_total).sum();
    println!(
        "hubmirror v{} | {} projects | {} records | {:?} store at {}",
        env!("CARGO_PKG_VERSION"),
        projects.len(),
        records,
        backend,
        data_dir,
    );

    if projects.is_empty() {
        println!("No projects mirrored yet. Run `hubmirror sync <address>` first.");
        return;
    }

    let rows: Vec<StatusTableRow> = projects
        .iter()
        .map(|p| StatusTableRow {
            project: p.name.to_string(),
            issues: cell(p, EntityCategory::Issues),
            issue_comments: cell(p, EntityCategory::IssueComments),
            issue_events: cell(p, EntityCategory::IssueEvents),
            commits: cell(p, EntityCategory::Commits),
            commit_comments: cell(p, EntityCategory::CommitComments),
            contributors: cell(p, EntityCategory::Contributors),
            last_sync: last_sync(p.synced_at),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let incomplete = projects.iter().filter(|p| is_incomplete(p)).count();
    if incomplete > 0 {
        println!(
            "{}",
            format!("{incomplete} project(s) hold fewer records than the remote reported.")
                .yellow()
        );
        println!("Run 'hubmirror sync <address>' again to resume them.");
    }
}

/// `stored/remote`, or just `stored` when the remote count is unknown.
fn cell(project: &ProjectSummary, category: EntityCategory) -> String {
    let stored = project.stored.get(&category).copied().unwrap_or(0);
    match project.stats {
        Some(stats) => format!("{stored}/{}", stats.get(category)),
        None => stored.to_string(),
    }
}

fn is_incomplete(project: &ProjectSummary) -> bool {
    let Some(stats) = project.stats else {
        return false;
    };
    EntityCategory::all().iter().any(|&category| {
        let stored = project.stored.get(&category).copied().unwrap_or(0) as u64;
        stored < stats.get(category)
    })
}

fn last_sync(synced_at: Option<DateTime<Utc>>) -> String {
    match synced_at {
        Some(at) => {
            let age = Utc::now().signed_duration_since(at).num_seconds().max(0) as u64;
            format!("{} ago", format_seconds(age))
        }
        None => "never".to_string(),
    }
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
