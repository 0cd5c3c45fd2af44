//! # hubmirror-store
//!
//! Persistent store for mirrored projects.
//!
//! [`ProjectStore`] is the contract the sync orchestrator writes through;
//! [`WriteSession`] scopes one project's sync. Two backends are provided:
//! [`FileStore`] (one JSON file per entity) and [`SqliteStore`] (a single
//! document database). [`open_backend`] picks one from the configuration.

pub mod backend;
pub mod error;
pub mod files;
pub mod session;
pub mod sqlite;

pub use backend::{open_backend, ProjectStore, ProjectSummary};
pub use error::StoreError;
pub use files::FileStore;
pub use session::WriteSession;
pub use sqlite::SqliteStore;
