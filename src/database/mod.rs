//! Review state persistence.
//!
//! The [`ReviewStore`] trait is the only thing the engine knows about storage.
//! Every record carries a version, and writes are compare-and-swap against
//! the version the writer last saw, so a concurrent update from another
//! device is detected instead of silently overwritten. Backends:
//! - [`MemoryStore`]: ephemeral, for unauthenticated sessions and tests
//! - [`SqliteStore`]: durable local database
//! - [`TieredStore`]: local cache in front of a remote authority

pub mod db;
pub mod memory;
pub mod tiered;

pub use db::{SqliteStore, StoredClock};
pub use memory::MemoryStore;
pub use tiered::{SyncReport, TieredStore};

use std::sync::Arc;

use tracing::warn;

use crate::error::StoreError;
use crate::models::{ItemKey, LearnerId, ReviewItem};

/// A review item together with the version it was stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub item: ReviewItem,
    pub version: u64,
}

/// Per-learner storage of review items.
pub trait ReviewStore: Send + Sync {
    /// Get the item for a key, or `None` if it has never been reviewed.
    fn get(&self, learner: &LearnerId, key: &ItemKey) -> Result<Option<StoredItem>, StoreError>;

    /// Compare-and-swap write.
    ///
    /// Succeeds only if the stored version equals `expected_version`
    /// (`None` meaning the key must not exist yet) and returns the new
    /// version. The write is durable when this returns.
    fn put(
        &self,
        learner: &LearnerId,
        item: &ReviewItem,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// All items of a learner, in no particular order.
    fn list_all(&self, learner: &LearnerId) -> Result<Vec<StoredItem>, StoreError>;
}

impl<S: ReviewStore + ?Sized> ReviewStore for Arc<S> {
    fn get(&self, learner: &LearnerId, key: &ItemKey) -> Result<Option<StoredItem>, StoreError> {
        (**self).get(learner, key)
    }

    fn put(
        &self,
        learner: &LearnerId,
        item: &ReviewItem,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        (**self).put(learner, item, expected_version)
    }

    fn list_all(&self, learner: &LearnerId) -> Result<Vec<StoredItem>, StoreError> {
        (**self).list_all(learner)
    }
}

/// Result of a last-write-wins write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The candidate was stored.
    Written(StoredItem),
    /// A record reviewed at the same time or later was already stored and was kept.
    Superseded(StoredItem),
}

/// Writes `candidate` with last-write-wins by `last_reviewed_at`.
///
/// Each attempt is a compare-and-swap against the latest version observed.
/// On conflict the latest record is re-read: if it was reviewed at the same
/// time or later than the candidate it wins and the candidate is dropped,
/// otherwise the candidate is retried against that version. Both sides of a
/// conflict were computed from the same base, so exactly one of them
/// survives and no repetition is counted twice.
pub fn write_last_wins(
    store: &dyn ReviewStore,
    learner: &LearnerId,
    candidate: &ReviewItem,
    mut expected_version: Option<u64>,
    max_attempts: u32,
) -> Result<WriteOutcome, StoreError> {
    let mut last_conflict = None;

    for attempt in 1..=max_attempts {
        match store.put(learner, candidate, expected_version) {
            Ok(version) => {
                return Ok(WriteOutcome::Written(StoredItem {
                    item: candidate.clone(),
                    version,
                }));
            }
            Err(conflict @ StoreError::Conflict { .. }) => {
                warn!(%learner, key = %candidate.key, attempt, "write conflict: {}", conflict);
                match store.get(learner, &candidate.key)? {
                    Some(latest) if latest.item.last_reviewed_at >= candidate.last_reviewed_at => {
                        return Ok(WriteOutcome::Superseded(latest));
                    }
                    Some(latest) => expected_version = Some(latest.version),
                    None => expected_version = None,
                }
                last_conflict = Some(conflict);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_conflict.unwrap_or_else(|| {
        StoreError::Unavailable("no write attempts allowed by configuration".to_string())
    }))
}

/// Writes `candidate` only if it was reviewed later than what is stored.
///
/// For records that were not computed from the stored state (imports,
/// restored backups): the stored record is compared before the first write,
/// and a same-time or newer stored review is kept without writing.
pub fn write_if_newer(
    store: &dyn ReviewStore,
    learner: &LearnerId,
    candidate: &ReviewItem,
    max_attempts: u32,
) -> Result<WriteOutcome, StoreError> {
    match store.get(learner, &candidate.key)? {
        Some(stored) if stored.item.last_reviewed_at >= candidate.last_reviewed_at => {
            Ok(WriteOutcome::Superseded(stored))
        }
        existing => {
            let expected = existing.map(|stored| stored.version);
            write_last_wins(store, learner, candidate, expected, max_attempts)
        }
    }
}
