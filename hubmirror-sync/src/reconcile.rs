//! Per-record create / upgrade / skip decisions for one entity category.

use hubmirror_core::{EntityCategory, EntityError, Project, Record};
use hubmirror_store::StoreError;
use serde::Serialize;
use serde_json::Value;

use crate::error::SyncError;
use crate::progress::Progress;
use crate::remote::RemoteSource;

/// What to do with one listed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Unknown entity. `complete` asks for the full form before persisting.
    Create { complete: bool },
    /// Known in summary form only, full form required.
    Upgrade,
    Skip,
}

/// Decide the fate of `record` against what `project` already holds.
pub fn decide(
    project: &Project,
    category: EntityCategory,
    record: &Record,
    full_required: bool,
) -> Result<Decision, EntityError> {
    let full_required = full_required && category.has_full_form();
    if !project.entity_exists(category, record)? {
        return Ok(Decision::Create {
            complete: full_required,
        });
    }
    if full_required && !project.full_entity_exists(category, record)? {
        Ok(Decision::Upgrade)
    } else {
        Ok(Decision::Skip)
    }
}

/// Bring a listed `record` to its full form.
///
/// Closed issues and commits are re-read from their single-resource address
/// under `listing`. Any other issue gets a null `closed_by`, which is what the
/// single-resource form would say.
pub fn complete_full(
    remote: &dyn RemoteSource,
    category: EntityCategory,
    listing: &str,
    record: Record,
) -> Result<Record, SyncError> {
    let Some(marker) = category.full_marker() else {
        return Ok(record);
    };
    let fetch = match category {
        EntityCategory::Issues => record.get("state").and_then(Value::as_str) == Some("closed"),
        _ => true,
    };
    let mut full = if fetch {
        let key = category.natural_key(&record)?;
        remote.fetch_one(&format!("{listing}/{key}"))?
    } else {
        record
    };
    if let Some(fields) = full.as_object_mut() {
        fields.entry(marker).or_insert(Value::Null);
    }
    Ok(full)
}

/// Counters for one category pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub category: EntityCategory,
    pub seen: u64,
    pub created: u64,
    pub upgraded: u64,
    pub skipped: u64,
}

impl CategoryReport {
    pub fn new(category: EntityCategory) -> Self {
        Self {
            category,
            seen: 0,
            created: 0,
            upgraded: 0,
            skipped: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.created + self.upgraded
    }
}

/// One category pass: where to list from and whether full form is required.
pub struct CategoryPass<'a> {
    pub category: EntityCategory,
    pub listing: &'a str,
    pub full_required: bool,
}

/// Walk the listing and apply each decision immediately.
///
/// Every written record goes through `persist` before the next one is
/// listed, so an error leaves everything before it durable.
pub fn reconcile(
    remote: &dyn RemoteSource,
    project: &mut Project,
    pass: &CategoryPass<'_>,
    progress: &dyn Progress,
    persist: &mut dyn FnMut(EntityCategory, &Record) -> Result<(), StoreError>,
) -> Result<CategoryReport, SyncError> {
    let category = pass.category;
    let mut report = CategoryReport::new(category);

    for item in remote.fetch_many(pass.listing, category.remote_filters()) {
        let record = item?;
        report.seen += 1;
        match decide(project, category, &record, pass.full_required)? {
            Decision::Skip => report.skipped += 1,
            Decision::Create { complete } => {
                let record = if complete {
                    complete_full(remote, category, pass.listing, record)?
                } else {
                    record
                };
                persist(category, &record)?;
                project.add(category, &record)?;
                report.created += 1;
            }
            Decision::Upgrade => {
                let record = complete_full(remote, category, pass.listing, record)?;
                persist(category, &record)?;
                project.add(category, &record)?;
                report.upgraded += 1;
            }
        }
        progress.step();
    }

    tracing::info!(
        "{category}: {} listed, {} created, {} upgraded, {} skipped",
        report.seen,
        report.created,
        report.upgraded,
        report.skipped
    );
    Ok(report)
}
