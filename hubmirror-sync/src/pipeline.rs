//! Shared sync entrypoint used by the CLI and the daemon.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use hubmirror_core::{MirrorConfig, RepoAddress};
use hubmirror_store::ProjectStore;

use crate::error::{io_err, SyncError};
use crate::github::GithubClient;
use crate::orchestrator::{Orchestrator, SyncOutcome};
use crate::progress::LogProgress;
use crate::vcs::GitCli;

/// Credentials passed through to the remote API and the source mirror.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub token: Option<String>,
}

impl Credentials {
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

/// Sync the project at `address` with the real GitHub client and `git`.
///
/// This is the canonical trigger for both `hubmirror sync` and the daemon's
/// `sync` request.
pub fn run(
    home: &Path,
    config: &MirrorConfig,
    store: &dyn ProjectStore,
    address: &str,
    credentials: &Credentials,
) -> Result<SyncOutcome, SyncError> {
    let address = RepoAddress::parse(address)?;
    let remote = GithubClient::new(credentials.token.clone());
    let vcs = GitCli::new(&config.git_executable, credentials.token.clone());
    let progress = LogProgress::new(config.verbose);
    let data_dir = config.data_dir_at(home);
    Orchestrator::new(config, store, &progress, &data_dir).sync(&address, &remote, &vcs)
}

/// Addresses listed in a batch file, one per line. Blank lines and `#`
/// comments are ignored.
pub fn read_batch_file(path: &Path) -> Result<Vec<String>, SyncError> {
    let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Parse and deduplicate batch addresses by project name, keeping the first
/// occurrence. Unparseable addresses are returned separately.
pub fn plan_batch(addresses: &[String]) -> (Vec<RepoAddress>, Vec<SyncError>) {
    let mut seen = HashSet::new();
    let mut planned = Vec::new();
    let mut rejected = Vec::new();
    for raw in addresses {
        match RepoAddress::parse(raw) {
            Ok(address) => {
                if seen.insert(address.project_name()) {
                    planned.push(address);
                } else {
                    tracing::warn!("{raw}: duplicate of an earlier address, ignored");
                }
            }
            Err(err) => rejected.push(err.into()),
        }
    }
    (planned, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubmirror_store::FileStore;
    use tempfile::TempDir;

    #[test]
    fn run_rejects_bad_address_before_any_io() {
        let home = TempDir::new().expect("home");
        let store = FileStore::new(home.path().join("data"));
        let err = run(
            home.path(),
            &MirrorConfig::default(),
            &store,
            "not-an-address",
            &Credentials::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Address(_)), "got: {err}");
        assert!(store.list_projects().unwrap().is_empty());
    }

    #[test]
    fn run_skips_existing_project_without_network() {
        let home = TempDir::new().expect("home");
        let store = FileStore::new(home.path().join("data"));
        let name = RepoAddress::parse("acme/widget").unwrap().project_name();
        store.open_session(&name).unwrap();
        store
            .close_session(&name, &hubmirror_core::Project::new(name.clone()))
            .unwrap();

        let config = MirrorConfig {
            update_existing_repos: false,
            ..MirrorConfig::default()
        };
        let outcome = run(
            home.path(),
            &config,
            &store,
            "https://github.com/acme/widget",
            &Credentials::token("t"),
        )
        .expect("run");
        assert_eq!(outcome, SyncOutcome::Skipped { name });
    }

    #[test]
    fn batch_file_skips_comments_and_blanks() {
        let dir = TempDir::new().expect("dir");
        let path = dir.path().join("repos.txt");
        fs::write(
            &path,
            "# projects\nhttps://github.com/acme/widget\n\n  acme/gadget  \n",
        )
        .unwrap();
        assert_eq!(
            read_batch_file(&path).unwrap(),
            vec!["https://github.com/acme/widget", "acme/gadget"]
        );
    }

    #[test]
    fn missing_batch_file_names_the_path() {
        let err = read_batch_file(Path::new("/nonexistent/repos.txt")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/repos.txt"));
    }

    #[test]
    fn plan_batch_dedupes_by_project_name() {
        let input: Vec<String> = [
            "https://github.com/acme/widget",
            "https://github.com/acme/widget.git",
            "acme/gadget",
            "nope",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let (planned, rejected) = plan_batch(&input);
        let names: Vec<String> = planned.iter().map(|a| a.project_name().0).collect();
        assert_eq!(names, vec!["acme_widget", "acme_gadget"]);
        assert_eq!(rejected.len(), 1);
    }
}
