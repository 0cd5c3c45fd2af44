//! Scripted collaborators for orchestrator tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use hubmirror_core::{EntityCategory, MirrorConfig, Project, ProjectName, ProjectStats, Record};
use hubmirror_store::{FileStore, ProjectStore, ProjectSummary, StoreError};
use hubmirror_sync::{Pages, RemoteError, RemoteSource, VcsError, VcsMirror};
use serde_json::{json, Value};

pub const API_BASE: &str = "http://api.test";
pub const API: &str = "http://api.test/repos/acme/widget";
pub const ADDRESS: &str = "https://github.com/acme/widget";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config() -> MirrorConfig {
    MirrorConfig {
        api_base_url: API_BASE.to_string(),
        ..MirrorConfig::default()
    }
}

/// Remote with fixed responses and a call counter per address.
#[derive(Default)]
pub struct FakeRemote {
    one: HashMap<String, Record>,
    many: HashMap<String, Vec<Record>>,
    /// Listing address -> index of the record that fails instead.
    fail_at: RefCell<HashMap<String, usize>>,
    calls: RefCell<HashMap<String, usize>>,
}

impl FakeRemote {
    /// A project with five issues (two closed), two commits and one record in
    /// every other category.
    pub fn widget() -> Self {
        let mut remote = FakeRemote::default();
        remote.respond(API, json!({"full_name": "acme/widget", "private": false}));

        let issues: Vec<Record> = (1..=5)
            .map(|n| {
                let state = if n % 2 == 0 { "closed" } else { "open" };
                json!({"number": n, "title": format!("issue {n}"), "state": state})
            })
            .collect();
        for issue in issues.iter().filter(|i| i["state"] == "closed") {
            let n = &issue["number"];
            let mut full = issue.clone();
            full["closed_by"] = json!({"login": "maintainer"});
            full["body"] = json!(format!("full body of {n}"));
            remote.respond(&format!("{API}/issues/{n}"), full);
        }
        remote.list("issues", issues);

        let commits = vec![
            json!({"sha": "aaa111", "commit": {"message": "first"}}),
            json!({"sha": "bbb222", "commit": {"message": "second"}}),
        ];
        for commit in &commits {
            let mut full = commit.clone();
            full["files"] = json!([{"filename": "src/lib.rs"}]);
            remote.respond(&format!("{API}/commits/{}", commit["sha"].as_str().unwrap()), full);
        }
        remote.list("commits", commits);

        remote.list("issues/comments", vec![json!({"id": 100, "body": "hi"})]);
        remote.list("issues/events", vec![json!({"id": 200, "event": "closed"})]);
        remote.list("comments", vec![json!({"id": 300, "body": "nice commit"})]);
        remote.list("contributors", vec![json!({"id": 400, "login": "alice"})]);
        remote
    }

    pub fn respond(&mut self, address: &str, record: Record) {
        self.one.insert(address.to_string(), record);
    }

    /// Listing under `<API>/<path>`.
    pub fn list(&mut self, path: &str, records: Vec<Record>) {
        self.many.insert(format!("{API}/{path}"), records);
    }

    pub fn fail_listing_at(&self, path: &str, index: usize) {
        self.fail_at.borrow_mut().insert(format!("{API}/{path}"), index);
    }

    pub fn heal(&self) {
        self.fail_at.borrow_mut().clear();
    }

    pub fn calls_to(&self, address: &str) -> usize {
        self.calls.borrow().get(address).copied().unwrap_or(0)
    }

    pub fn calls_matching(&self, pred: impl Fn(&str) -> bool) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|(a, _)| pred(a))
            .map(|(_, n)| n)
            .sum()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().values().sum()
    }

    pub fn reset_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn hit(&self, address: &str) {
        *self.calls.borrow_mut().entry(address.to_string()).or_default() += 1;
    }
}

impl RemoteSource for FakeRemote {
    fn fetch_one(&self, address: &str) -> Result<Record, RemoteError> {
        self.hit(address);
        self.one.get(address).cloned().ok_or_else(|| RemoteError::NotFound {
            address: address.to_string(),
        })
    }

    fn fetch_many<'a>(&'a self, address: &str, _filters: &[&str]) -> Pages<'a> {
        self.hit(address);
        let records = self.many.get(address).cloned().unwrap_or_default();
        let mut items: Vec<Result<Record, RemoteError>> = records.into_iter().map(Ok).collect();
        if let Some(index) = self.fail_at.borrow().get(address).copied() {
            items.truncate(index);
            items.push(Err(RemoteError::Unavailable {
                address: address.to_string(),
                reason: "connection reset".to_string(),
            }));
        }
        Box::new(items.into_iter())
    }

    fn count_of(&self, address: &str, _filters: &[&str]) -> Result<u64, RemoteError> {
        self.hit(address);
        Ok(self.many.get(address).map_or(0, Vec::len) as u64)
    }
}

/// Mirror that records operations and fakes a working copy with a `.git` dir.
#[derive(Default)]
pub struct RecordingVcs {
    pub ops: RefCell<Vec<String>>,
    pub fail: bool,
}

impl VcsMirror for RecordingVcs {
    fn exists(&self, path: &Path) -> bool {
        path.join(".git").is_dir()
    }

    fn clone_repo(&self, address: &str, path: &Path) -> Result<(), VcsError> {
        self.ops.borrow_mut().push(format!("clone {address} {}", path.display()));
        if self.fail {
            return Err(VcsError::Failed {
                command: "git clone".to_string(),
                status: "exit status: 128".to_string(),
                stderr: "repository not found".to_string(),
            });
        }
        fs::create_dir_all(path.join(".git")).map_err(|source| VcsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn pull(&self, path: &Path) -> Result<(), VcsError> {
        self.ops.borrow_mut().push(format!("pull {}", path.display()));
        Ok(())
    }
}

/// [`FileStore`] that counts entity writes.
pub struct CountingStore {
    pub inner: FileStore,
    writes: AtomicUsize,
    fail_close: AtomicBool,
}

impl CountingStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            inner: FileStore::new(root),
            writes: AtomicUsize::new(0),
            fail_close: AtomicBool::new(false),
        }
    }

    /// Make `close_session` release the claim and then fail.
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset_writes(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Every entity body on disk keyed by `<category>/<key>`.
    pub fn snapshot(&self, name: &ProjectName) -> HashMap<String, Value> {
        let mut out = HashMap::new();
        for &category in EntityCategory::all() {
            let Ok(entries) = fs::read_dir(self.inner.category_dir(name, category)) else {
                continue;
            };
            for entry in entries {
                let path = entry.unwrap().path();
                let key = path.file_stem().unwrap().to_string_lossy().to_string();
                let body = fs::read_to_string(&path).unwrap();
                out.insert(
                    format!("{category:?}/{key}"),
                    serde_json::from_str(&body).unwrap(),
                );
            }
        }
        out
    }
}

impl ProjectStore for CountingStore {
    fn project_exists(&self, name: &ProjectName) -> Result<bool, StoreError> {
        self.inner.project_exists(name)
    }

    fn open_session(&self, name: &ProjectName) -> Result<(), StoreError> {
        self.inner.open_session(name)
    }

    fn close_session(&self, name: &ProjectName, project: &Project) -> Result<(), StoreError> {
        if self.fail_close.load(Ordering::SeqCst) {
            self.inner.release_session(name);
            return Err(StoreError::Io {
                path: self.inner.manifest_path(name),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.close_session(name, project)
    }

    fn release_session(&self, name: &ProjectName) {
        self.inner.release_session(name)
    }

    fn load_project(&self, name: &ProjectName) -> Result<Project, StoreError> {
        self.inner.load_project(name)
    }

    fn persist_info(&self, name: &ProjectName, info: &Value) -> Result<(), StoreError> {
        self.inner.persist_info(name, info)
    }

    fn persist_stats(&self, name: &ProjectName, stats: &ProjectStats) -> Result<(), StoreError> {
        self.inner.persist_stats(name, stats)
    }

    fn persist(
        &self,
        name: &ProjectName,
        category: EntityCategory,
        record: &Record,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.persist(name, category, record)
    }

    fn list_projects(&self) -> Result<Vec<ProjectSummary>, StoreError> {
        self.inner.list_projects()
    }
}
