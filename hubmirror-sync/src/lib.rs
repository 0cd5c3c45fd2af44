//! # hubmirror-sync
//!
//! Incremental synchronization of one hosted project into a [`ProjectStore`].
//!
//! [`Orchestrator::sync`] drives a single project through info, statistics,
//! every enabled entity category and the optional source mirror.
//! [`pipeline::run`] wires the real GitHub client and `git` mirror for callers
//! that only have an address and a token.
//!
//! [`ProjectStore`]: hubmirror_store::ProjectStore

pub mod error;
pub mod github;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod remote;
pub mod vcs;

pub use error::{RemoteError, SyncError, VcsError};
pub use github::GithubClient;
pub use orchestrator::{Orchestrator, SourceAction, SyncOutcome, SyncReport};
pub use pipeline::Credentials;
pub use progress::{LogProgress, NoProgress, Progress};
pub use reconcile::{CategoryReport, Decision};
pub use remote::{Pages, RemoteSource};
pub use vcs::{GitCli, VcsMirror};
