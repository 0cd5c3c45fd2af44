//! Scoped write session for one project.

use hubmirror_core::{Project, ProjectName};

use crate::backend::ProjectStore;
use crate::error::StoreError;

/// Exclusive write session bound to one project name.
///
/// Call [`WriteSession::finalize`] exactly once with the accumulated project.
/// A session dropped without finalizing (a panic in the middle of a sync)
/// releases its claim without committing, so a later sync can open it again.
pub struct WriteSession<'s> {
    store: &'s dyn ProjectStore,
    name: ProjectName,
    finalized: bool,
}

impl<'s> WriteSession<'s> {
    pub fn open(store: &'s dyn ProjectStore, name: &ProjectName) -> Result<Self, StoreError> {
        store.open_session(name)?;
        tracing::debug!("write session opened: {name}");
        Ok(Self {
            store,
            name: name.clone(),
            finalized: false,
        })
    }

    pub fn name(&self) -> &ProjectName {
        &self.name
    }

    /// Commit `project` and close the session.
    pub fn finalize(mut self, project: &Project) -> Result<(), StoreError> {
        self.finalized = true;
        let result = self.store.close_session(&self.name, project);
        match &result {
            Ok(()) => tracing::debug!("write session committed: {}", self.name),
            Err(err) => tracing::error!("write session commit failed for {}: {err}", self.name),
        }
        result
    }
}

impl Drop for WriteSession<'_> {
    fn drop(&mut self) {
        if !self.finalized {
            tracing::warn!("write session for {} dropped without finalize", self.name);
            self.store.release_session(&self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::FileStore;
    use tempfile::TempDir;

    #[test]
    fn second_open_is_rejected_until_finalized() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let name = ProjectName::from("acme_widget");

        let session = WriteSession::open(&store, &name).unwrap();
        assert!(matches!(
            WriteSession::open(&store, &name),
            Err(StoreError::SessionBusy { .. })
        ));

        session.finalize(&Project::new(name.clone())).unwrap();
        let again = WriteSession::open(&store, &name).unwrap();
        again.finalize(&Project::new(name)).unwrap();
    }

    #[test]
    fn drop_releases_claim() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let name = ProjectName::from("acme_widget");

        {
            let _session = WriteSession::open(&store, &name).unwrap();
        }
        WriteSession::open(&store, &name)
            .expect("dropped session must release")
            .finalize(&Project::new(name))
            .unwrap();
    }

    #[test]
    fn sessions_for_different_projects_coexist() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let a = WriteSession::open(&store, &ProjectName::from("a_b")).unwrap();
        let b = WriteSession::open(&store, &ProjectName::from("c_d")).unwrap();
        a.finalize(&Project::new(ProjectName::from("a_b"))).unwrap();
        b.finalize(&Project::new(ProjectName::from("c_d"))).unwrap();
    }
}
