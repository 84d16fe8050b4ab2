//! In-memory implementation of `ReviewStore`.
//!
//! Backs unauthenticated sessions: same contract as the durable stores, but
//! everything is lost when the process exits. It can also be switched
//! offline, which makes it the stand-in for a remote authority in tests.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{ReviewStore, StoredItem};
use crate::error::StoreError;
use crate::models::{ItemKey, LearnerId, ReviewItem};

/// Items are partitioned by learner; no lock is shared between learners'
/// data beyond the map itself.
#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<HashMap<LearnerId, HashMap<ItemKey, StoredItem>>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// When unavailable every operation fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("memory store lock poisoned".to_string())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewStore for MemoryStore {
    fn get(&self, learner: &LearnerId, key: &ItemKey) -> Result<Option<StoredItem>, StoreError> {
        self.ensure_available()?;
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(records
            .get(learner)
            .and_then(|items| items.get(key))
            .cloned())
    }

    fn put(
        &self,
        learner: &LearnerId,
        item: &ReviewItem,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        self.ensure_available()?;
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        let items = records.entry(learner.clone()).or_default();

        let found = items.get(&item.key).map(|stored| stored.version);
        if found != expected_version {
            return Err(StoreError::Conflict {
                key: item.key.clone(),
                expected: expected_version,
                found,
            });
        }

        let version = found.unwrap_or(0) + 1;
        items.insert(
            item.key.clone(),
            StoredItem {
                item: item.clone(),
                version,
            },
        );
        Ok(version)
    }

    fn list_all(&self, learner: &LearnerId) -> Result<Vec<StoredItem>, StoreError> {
        self.ensure_available()?;
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(records
            .get(learner)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default())
    }
}
