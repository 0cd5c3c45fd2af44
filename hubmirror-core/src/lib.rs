//! hubmirror core library — domain types, entity predicates, configuration.
//!
//! - [`types`] — newtypes, project statistics and the [`Record`] alias
//! - [`address`] — remote address parsing and project name derivation
//! - [`entity`] — entity categories, natural keys and the full-form predicates
//! - [`project`] — the in-memory [`Project`] aggregate
//! - [`config`] — YAML configuration at `~/.hubmirror/config.yaml`
//! - [`error`] — error enums for the above

pub mod address;
pub mod config;
pub mod entity;
pub mod error;
pub mod project;
pub mod types;

pub use address::RepoAddress;
pub use config::{MirrorConfig, StoreBackend};
pub use entity::{Completeness, EntityCategory};
pub use error::{AddressError, ConfigError, EntityError};
pub use project::{KnownEntities, Project};
pub use types::{ProjectName, ProjectStats, Record};
