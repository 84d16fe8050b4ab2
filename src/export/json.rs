//! JSON import/export for review records and lesson catalogs.
//! Exports carry the persisted record shape of every item of one learner;
//! imports go through the same last-write-wins path as reviews, so an old
//! backup never overwrites newer progress.

use crate::database::{ReviewStore, WriteOutcome, write_if_newer};
use crate::error::StoreError;
use crate::models::{Catalog, LearnerId, ReviewItem, SchedulingPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewExport {
    pub learner_id: LearnerId,
    pub exported_at: DateTime<Utc>,
    pub items: Vec<ReviewItem>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub written: usize,
    /// Items the store already held a same-time or newer review for.
    pub kept_existing: usize,
    /// Items violating the record invariants; never written.
    pub rejected: usize,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_file(path: &Path) -> Result<String, ExportError> {
    let mut file = File::open(path).map_err(io_error(path))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).map_err(io_error(path))?;
    Ok(contents)
}

/// Writes every review item of `learner` to `path`, returning the item count.
pub fn export_json_to_path(
    store: &dyn ReviewStore,
    learner: &LearnerId,
    path: &Path,
    now: DateTime<Utc>,
) -> Result<usize, ExportError> {
    let mut items: Vec<ReviewItem> = store
        .list_all(learner)?
        .into_iter()
        .map(|stored| stored.item)
        .collect();
    items.sort_by(|a, b| a.key.cmp(&b.key));

    let export = ReviewExport {
        learner_id: learner.clone(),
        exported_at: now,
        items,
    };
    let json_string = serde_json::to_string_pretty(&export)?;
    let mut file = File::create(path).map_err(io_error(path))?;
    file.write_all(json_string.as_bytes()).map_err(io_error(path))?;

    info!(%learner, path = %path.display(), count = export.items.len(), "exported review items");
    Ok(export.items.len())
}

/// Reads an export file without applying it.
pub fn import_json(path: &Path) -> Result<ReviewExport, ExportError> {
    let contents = read_file(path)?;
    let export: ReviewExport = serde_json::from_str(&contents)?;
    Ok(export)
}

/// Checks the invariants every record written by the engine satisfies.
fn is_consistent(item: &ReviewItem, policy: &SchedulingPolicy) -> bool {
    let ease_ok = item.ease_factor.is_finite() && item.ease_factor >= policy.min_ease;
    let interval_ok = item.interval_days <= policy.max_interval_days;
    let due_ok = match item.last_reviewed_at {
        Some(reviewed) => reviewed
            .checked_add_signed(chrono::Duration::days(i64::from(item.interval_days)))
            .is_some_and(|due| due == item.due_date),
        None => item.repetitions == 0,
    };
    let mastered_ok = item.mastered
        == (item.repetitions >= policy.mastery_repetitions && item.ease_factor >= policy.mastery_ease);
    ease_ok && interval_ok && due_ok && mastered_ok
}

/// Applies an export to `learner`'s items in `store`.
///
/// The export's own learner id is informational; items are always written
/// for `learner`.
pub fn apply_import(
    store: &dyn ReviewStore,
    learner: &LearnerId,
    export: &ReviewExport,
    policy: &SchedulingPolicy,
    max_write_attempts: u32,
) -> Result<ImportSummary, ExportError> {
    let mut summary = ImportSummary::default();

    for item in &export.items {
        if !is_consistent(item, policy) {
            warn!(key = %item.key, "skipping inconsistent imported record");
            summary.rejected += 1;
            continue;
        }

        match write_if_newer(store, learner, item, max_write_attempts)? {
            WriteOutcome::Written(_) => summary.written += 1,
            WriteOutcome::Superseded(_) => summary.kept_existing += 1,
        }
    }

    info!(
        %learner,
        written = summary.written,
        kept_existing = summary.kept_existing,
        rejected = summary.rejected,
        "imported review items"
    );
    Ok(summary)
}

/// Loads a lesson catalog from a JSON file.
pub fn load_catalog(path: &Path) -> Result<Catalog, ExportError> {
    let contents = read_file(path)?;
    let catalog: Catalog = serde_json::from_str(&contents)?;
    Ok(catalog)
}
