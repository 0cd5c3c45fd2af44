//! Drives one project through a complete sync.

use std::path::{Path, PathBuf};
use std::time::Instant;

use hubmirror_core::{
    EntityCategory, MirrorConfig, Project, ProjectName, ProjectStats, Record, RepoAddress,
};
use hubmirror_store::{ProjectStore, WriteSession};
use serde::Serialize;

use crate::error::SyncError;
use crate::progress::Progress;
use crate::reconcile::{reconcile, CategoryPass, CategoryReport};
use crate::remote::RemoteSource;
use crate::vcs::VcsMirror;

/// Directory under a project's data dir holding the source mirror.
pub const SOURCE_DIR: &str = "sourcecode";

/// What happened to the source mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceAction {
    Cloned,
    Pulled,
}

/// Result of a sync that ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub name: ProjectName,
    pub stats: Option<ProjectStats>,
    pub categories: Vec<CategoryReport>,
    pub source: Option<SourceAction>,
    pub elapsed_ms: u64,
}

impl SyncReport {
    fn new(name: ProjectName) -> Self {
        Self {
            name,
            stats: None,
            categories: Vec::new(),
            source: None,
            elapsed_ms: 0,
        }
    }

    /// Records created or upgraded across all categories.
    pub fn written(&self) -> u64 {
        self.categories.iter().map(CategoryReport::written).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The project exists and updating existing projects is disabled.
    Skipped { name: ProjectName },
    Synced(SyncReport),
}

impl SyncOutcome {
    pub fn name(&self) -> &ProjectName {
        match self {
            SyncOutcome::Skipped { name } => name,
            SyncOutcome::Synced(report) => &report.name,
        }
    }
}

/// Sync driver with its collaborators injected.
pub struct Orchestrator<'a> {
    config: &'a MirrorConfig,
    store: &'a dyn ProjectStore,
    progress: &'a dyn Progress,
    data_dir: PathBuf,
}

impl<'a> Orchestrator<'a> {
    /// `data_dir` is where source mirrors are placed, one per project.
    pub fn new(
        config: &'a MirrorConfig,
        store: &'a dyn ProjectStore,
        progress: &'a dyn Progress,
        data_dir: &Path,
    ) -> Self {
        Self {
            config,
            store,
            progress,
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// Local path of the source mirror for `name`.
    pub fn source_dir(&self, name: &ProjectName) -> PathBuf {
        self.data_dir.join(name.as_str()).join(SOURCE_DIR)
    }

    /// Sync one project.
    ///
    /// The write session is finalized whether or not the steps succeed. A
    /// step error is returned after finalizing; a finalize error wins over it.
    pub fn sync(
        &self,
        address: &RepoAddress,
        remote: &dyn RemoteSource,
        vcs: &dyn VcsMirror,
    ) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        let name = address.project_name();
        tracing::info!("syncing project {name} from {address}");

        if self.store.project_exists(&name)? {
            if !self.config.update_existing_repos {
                tracing::info!("project {name} already exists, skipping");
                return Ok(SyncOutcome::Skipped { name });
            }
            tracing::info!("project {name} already exists, resuming");
        }

        let session = WriteSession::open(self.store, &name)?;
        let mut project = self.store.load_project(&name)?;
        let mut report = SyncReport::new(name.clone());

        let steps = self.run_steps(address, remote, vcs, &mut project, &mut report);
        let finalized = session.finalize(&project);

        match (steps, finalized) {
            (Ok(()), Ok(())) => {
                report.elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::info!(
                    "project {name} synced: {} records written in {} ms",
                    report.written(),
                    report.elapsed_ms
                );
                Ok(SyncOutcome::Synced(report))
            }
            (Err(err), Ok(())) => {
                tracing::error!("sync of {name} stopped: {err}");
                Err(err)
            }
            (steps, Err(err)) => {
                if let Err(step_err) = steps {
                    tracing::error!("sync of {name} stopped: {step_err}");
                }
                Err(err.into())
            }
        }
    }

    fn run_steps(
        &self,
        address: &RepoAddress,
        remote: &dyn RemoteSource,
        vcs: &dyn VcsMirror,
        project: &mut Project,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let name = project.name.clone();
        let api = address.api_address(&self.config.api_base_url);

        let info = remote.fetch_one(&api)?;
        self.store.persist_info(&name, &info)?;
        project.set_info(info);

        let stats = self.fetch_stats(remote, &api)?;
        self.store.persist_stats(&name, &stats)?;
        project.set_stats(stats);
        report.stats = Some(stats);

        for &category in EntityCategory::all() {
            if !self.config.downloads(category) {
                tracing::debug!("{category} disabled, skipping");
                continue;
            }
            let listing = format!("{api}/{}", category.remote_path());
            let pass = CategoryPass {
                category,
                listing: &listing,
                full_required: self.config.full_required(category),
            };
            let mut persist =
                |c: EntityCategory, record: &Record| self.store.persist(&name, c, record);

            self.progress
                .start(&format!("retrieving {category}"), Some(stats.get(category)));
            let outcome = reconcile(remote, project, &pass, self.progress, &mut persist);
            self.progress.end();
            report.categories.push(outcome?);
        }

        if self.config.download_source_code {
            let path = self.source_dir(&name);
            self.progress.start("retrieving source code", None);
            let action = if vcs.exists(&path) {
                vcs.pull(&path).map(|()| SourceAction::Pulled)
            } else {
                vcs.clone_repo(&address.clone_address(), &path)
                    .map(|()| SourceAction::Cloned)
            };
            self.progress.end();
            report.source = Some(action?);
        }
        Ok(())
    }

    /// Counts for every enabled category. Disabled ones stay at zero and are
    /// never asked for.
    fn fetch_stats(
        &self,
        remote: &dyn RemoteSource,
        api: &str,
    ) -> Result<ProjectStats, SyncError> {
        let mut stats = ProjectStats::default();
        let total = EntityCategory::all().len() as u64;
        self.progress.start("retrieving project statistics", Some(total));
        for &category in EntityCategory::all() {
            if self.config.downloads(category) {
                let listing = format!("{api}/{}", category.remote_path());
                match remote.count_of(&listing, category.remote_filters()) {
                    Ok(count) => stats.set(category, count),
                    Err(err) => {
                        self.progress.end();
                        return Err(err.into());
                    }
                }
            }
            self.progress.step();
        }
        self.progress.end();
        Ok(stats)
    }
}
