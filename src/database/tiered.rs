//! Two-tier review store: a local cache in front of a remote authority.
//!
//! Reads are served from the local tier; a cache miss falls through to the
//! remote and fills the cache. Writes land in the local tier first (durable
//! before `put` returns) and are then pushed to the remote with
//! last-write-wins reconciliation against the last remote version this
//! device has seen. Writes that cannot reach the remote wait in an outbox
//! until [`TieredStore::sync`] flushes them.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::{ReviewStore, StoredItem, WriteOutcome, write_last_wins};
use crate::error::StoreError;
use crate::models::{ItemKey, LearnerId, ReviewItem};

/// A local write waiting to reach the remote.
#[derive(Debug, Clone)]
struct PendingWrite {
    learner: LearnerId,
    item: ReviewItem,
    attempts: u32,
    last_error: Option<String>,
}

/// What one call to [`TieredStore::sync`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Outbox writes accepted by the remote.
    pub pushed: usize,
    /// Outbox writes dropped because the remote held a newer review.
    pub superseded: usize,
    /// Remote records copied into the local tier.
    pub pulled: usize,
    /// Writes still waiting in the outbox.
    pub pending: usize,
}

enum RemotePush {
    Written,
    Superseded(StoredItem),
}

pub struct TieredStore {
    local: Box<dyn ReviewStore>,
    remote: Box<dyn ReviewStore>,
    /// Latest remote version seen per item; the base for the next remote write.
    remote_versions: Mutex<HashMap<(LearnerId, ItemKey), u64>>,
    outbox: Mutex<Vec<PendingWrite>>,
    max_write_attempts: u32,
}

impl TieredStore {
    pub fn new(
        local: impl ReviewStore + 'static,
        remote: impl ReviewStore + 'static,
        max_write_attempts: u32,
    ) -> Self {
        Self {
            local: Box::new(local),
            remote: Box::new(remote),
            remote_versions: Mutex::new(HashMap::new()),
            outbox: Mutex::new(Vec::new()),
            max_write_attempts,
        }
    }

    /// Number of writes for `learner` not yet accepted by the remote.
    pub fn pending_count(&self, learner: &LearnerId) -> Result<usize, StoreError> {
        let outbox = self.outbox.lock().map_err(|_| poisoned())?;
        Ok(outbox.iter().filter(|w| &w.learner == learner).count())
    }

    /// Flushes the learner's outbox to the remote, then pulls every remote
    /// record that is newer than (or missing from) the local tier.
    ///
    /// If the remote is still unreachable the unflushed writes stay queued
    /// and the error is returned.
    pub fn sync(&self, learner: &LearnerId) -> Result<SyncReport, StoreError> {
        let mut report = SyncReport::default();

        let mut remaining = Vec::new();
        let mut failure = None;
        for mut write in self.take_pending(learner)? {
            if failure.is_some() {
                remaining.push(write);
                continue;
            }
            match self.push_remote(learner, &write.item) {
                Ok(RemotePush::Written) => report.pushed += 1,
                Ok(RemotePush::Superseded(_)) => report.superseded += 1,
                Err(e) => {
                    write.attempts += 1;
                    write.last_error = Some(e.to_string());
                    remaining.push(write);
                    failure = Some(e);
                }
            }
        }
        report.pending = remaining.len();
        self.requeue(remaining)?;
        if let Some(e) = failure {
            warn!(%learner, pending = report.pending, "sync stopped, remote write failed: {}", e);
            return Err(e);
        }

        for remote in self.remote.list_all(learner)? {
            let key = remote.item.key.clone();
            self.set_remote_version(learner, &key, remote.version)?;
            match self.local.get(learner, &key)? {
                None => {
                    self.local.put(learner, &remote.item, None)?;
                    report.pulled += 1;
                }
                Some(local)
                    if local.item != remote.item
                        && remote.item.last_reviewed_at >= local.item.last_reviewed_at =>
                {
                    self.local.put(learner, &remote.item, Some(local.version))?;
                    report.pulled += 1;
                }
                Some(_) => {}
            }
        }

        info!(
            %learner,
            pushed = report.pushed,
            superseded = report.superseded,
            pulled = report.pulled,
            "sync complete"
        );
        Ok(report)
    }

    fn push_remote(&self, learner: &LearnerId, item: &ReviewItem) -> Result<RemotePush, StoreError> {
        let base = self.remote_version(learner, &item.key)?;
        match write_last_wins(
            &*self.remote,
            learner,
            item,
            base,
            self.max_write_attempts,
        )? {
            WriteOutcome::Written(stored) => {
                self.set_remote_version(learner, &item.key, stored.version)?;
                Ok(RemotePush::Written)
            }
            WriteOutcome::Superseded(winner) => {
                self.set_remote_version(learner, &item.key, winner.version)?;
                self.adopt_locally(learner, &winner.item)?;
                warn!(%learner, key = %item.key, "remote holds a newer review, local write superseded");
                Ok(RemotePush::Superseded(winner))
            }
        }
    }

    /// Overwrites the local copy with a record that won reconciliation.
    fn adopt_locally(&self, learner: &LearnerId, item: &ReviewItem) -> Result<u64, StoreError> {
        let current = self.local.get(learner, &item.key)?;
        self.local
            .put(learner, item, current.map(|stored| stored.version))
    }

    fn remote_version(&self, learner: &LearnerId, key: &ItemKey) -> Result<Option<u64>, StoreError> {
        let versions = self.remote_versions.lock().map_err(|_| poisoned())?;
        Ok(versions.get(&(learner.clone(), key.clone())).copied())
    }

    fn set_remote_version(&self, learner: &LearnerId, key: &ItemKey, version: u64) -> Result<(), StoreError> {
        let mut versions = self.remote_versions.lock().map_err(|_| poisoned())?;
        versions.insert((learner.clone(), key.clone()), version);
        Ok(())
    }

    /// Queues a write, replacing any earlier queued write for the same item.
    fn enqueue(&self, learner: &LearnerId, item: &ReviewItem, error: &StoreError) -> Result<(), StoreError> {
        let mut outbox = self.outbox.lock().map_err(|_| poisoned())?;
        outbox.retain(|w| !(&w.learner == learner && w.item.key == item.key));
        outbox.push(PendingWrite {
            learner: learner.clone(),
            item: item.clone(),
            attempts: 1,
            last_error: Some(error.to_string()),
        });
        Ok(())
    }

    fn drop_pending(&self, learner: &LearnerId, key: &ItemKey) -> Result<(), StoreError> {
        let mut outbox = self.outbox.lock().map_err(|_| poisoned())?;
        outbox.retain(|w| !(&w.learner == learner && &w.item.key == key));
        Ok(())
    }

    fn take_pending(&self, learner: &LearnerId) -> Result<Vec<PendingWrite>, StoreError> {
        let mut outbox = self.outbox.lock().map_err(|_| poisoned())?;
        let (mine, others): (Vec<_>, Vec<_>) =
            outbox.drain(..).partition(|w| &w.learner == learner);
        *outbox = others;
        Ok(mine)
    }

    fn requeue(&self, writes: Vec<PendingWrite>) -> Result<(), StoreError> {
        let mut outbox = self.outbox.lock().map_err(|_| poisoned())?;
        for write in &writes {
            debug!(
                learner = %write.learner,
                key = %write.item.key,
                reviewed_at = ?write.item.last_reviewed_at,
                attempts = write.attempts,
                last_error = write.last_error.as_deref().unwrap_or(""),
                "write stays queued"
            );
        }
        outbox.extend(writes);
        Ok(())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("tiered store lock poisoned".to_string())
}

impl ReviewStore for TieredStore {
    /// A local miss while the remote is unreachable is an error, not an
    /// absent item: the remote may hold history this device has not seen.
    fn get(&self, learner: &LearnerId, key: &ItemKey) -> Result<Option<StoredItem>, StoreError> {
        if let Some(stored) = self.local.get(learner, key)? {
            return Ok(Some(stored));
        }

        match self.remote.get(learner, key)? {
            Some(remote) => {
                self.set_remote_version(learner, key, remote.version)?;
                let version = self.local.put(learner, &remote.item, None)?;
                debug!(%learner, %key, "filled local cache from remote");
                Ok(Some(StoredItem {
                    item: remote.item,
                    version,
                }))
            }
            None => Ok(None),
        }
    }

    /// Returns the local version. When the remote already holds a newer
    /// review, that review is adopted locally and a conflict is reported so
    /// the writer re-reads it.
    fn put(
        &self,
        learner: &LearnerId,
        item: &ReviewItem,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let local_version = self.local.put(learner, item, expected_version)?;

        match self.push_remote(learner, item) {
            Ok(RemotePush::Written) => {
                self.drop_pending(learner, &item.key)?;
                Ok(local_version)
            }
            Ok(RemotePush::Superseded(_)) => {
                self.drop_pending(learner, &item.key)?;
                Err(StoreError::Conflict {
                    key: item.key.clone(),
                    expected: expected_version,
                    found: Some(local_version + 1),
                })
            }
            Err(e) => {
                warn!(%learner, key = %item.key, "remote write failed, queued for sync: {}", e);
                self.enqueue(learner, item, &e)?;
                Ok(local_version)
            }
        }
    }

    fn list_all(&self, learner: &LearnerId) -> Result<Vec<StoredItem>, StoreError> {
        self.local.list_all(learner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::{LessonType, SchedulingPolicy};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, hour, 0, 0).unwrap()
    }

    fn reviewed(repetitions: u32, when: DateTime<Utc>) -> ReviewItem {
        let mut item = ReviewItem::new(
            ItemKey::new(2, LessonType::Sentences, "where-is"),
            &SchedulingPolicy::default(),
            when,
        );
        item.repetitions = repetitions;
        item.last_reviewed_at = Some(when);
        item.due_date = when + Duration::days(1);
        item
    }

    #[test]
    fn test_online_write_reaches_both_tiers() {
        let remote = Arc::new(MemoryStore::new());
        let store = TieredStore::new(MemoryStore::new(), Arc::clone(&remote), 3);
        let learner = LearnerId::from("yuna");

        store.put(&learner, &reviewed(1, at(8)), None).unwrap();

        let key = reviewed(0, at(8)).key;
        assert_eq!(remote.get(&learner, &key).unwrap().unwrap().item.repetitions, 1);
        assert_eq!(store.get(&learner, &key).unwrap().unwrap().item.repetitions, 1);
        assert_eq!(store.pending_count(&learner).unwrap(), 0);
    }

    #[test]
    fn test_offline_write_is_queued_then_flushed() {
        let remote = Arc::new(MemoryStore::new());
        let store = TieredStore::new(MemoryStore::new(), Arc::clone(&remote), 3);
        let learner = LearnerId::from("yuna");
        let key = reviewed(0, at(8)).key;

        remote.set_available(false);
        let version = store.put(&learner, &reviewed(1, at(8)), None).unwrap();
        assert_eq!(version, 1);
        assert_eq!(store.pending_count(&learner).unwrap(), 1);
        // Local write is visible immediately
        assert_eq!(store.list_all(&learner).unwrap().len(), 1);

        assert!(matches!(store.sync(&learner), Err(StoreError::Unavailable(_))));
        assert_eq!(store.pending_count(&learner).unwrap(), 1);

        remote.set_available(true);
        let report = store.sync(&learner).unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(report.pending, 0);
        assert_eq!(store.pending_count(&learner).unwrap(), 0);
        assert_eq!(remote.get(&learner, &key).unwrap().unwrap().item.repetitions, 1);
    }

    #[test]
    fn test_poisoned_outbox_is_reported() {
        let store = Arc::new(TieredStore::new(MemoryStore::new(), MemoryStore::new(), 3));
        let learner = LearnerId::from("yuna");

        let holder = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _outbox = holder.outbox.lock().unwrap();
            panic!("writer died while holding the outbox");
        })
        .join();

        assert!(matches!(
            store.pending_count(&learner),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_cache_miss_fills_from_remote() {
        let remote = Arc::new(MemoryStore::new());
        let learner = LearnerId::from("yuna");
        remote.put(&learner, &reviewed(3, at(9)), None).unwrap();

        let store = TieredStore::new(MemoryStore::new(), Arc::clone(&remote), 3);
        let key = reviewed(0, at(9)).key;
        let stored = store.get(&learner, &key).unwrap().unwrap();
        assert_eq!(stored.item.repetitions, 3);

        // Served from the cache once filled
        remote.set_available(false);
        assert!(store.get(&learner, &key).unwrap().is_some());
    }

    #[test]
    fn test_offline_cache_miss_is_an_error() {
        let remote = Arc::new(MemoryStore::new());
        let store = TieredStore::new(MemoryStore::new(), Arc::clone(&remote), 3);
        remote.set_available(false);

        let result = store.get(&LearnerId::from("yuna"), &reviewed(0, at(9)).key);
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_newer_remote_review_is_adopted() {
        let remote = Arc::new(MemoryStore::new());
        let learner = LearnerId::from("yuna");
        let store = TieredStore::new(MemoryStore::new(), Arc::clone(&remote), 3);
        store.put(&learner, &reviewed(1, at(8)), None).unwrap();

        // Another device reviews later and reaches the remote first
        remote.put(&learner, &reviewed(2, at(12)), Some(1)).unwrap();

        let result = store.put(&learner, &reviewed(2, at(10)), Some(1));
        assert!(matches!(result, Err(StoreError::Conflict { .. })));

        let key = reviewed(0, at(8)).key;
        let local = store.get(&learner, &key).unwrap().unwrap();
        assert_eq!(local.item.last_reviewed_at, Some(at(12)));
        assert_eq!(remote.get(&learner, &key).unwrap().unwrap().version, 2);
    }

    #[test]
    fn test_sync_pulls_records_from_other_devices() {
        let remote = Arc::new(MemoryStore::new());
        let learner = LearnerId::from("yuna");
        let device_a = TieredStore::new(MemoryStore::new(), Arc::clone(&remote), 3);
        let device_b = TieredStore::new(MemoryStore::new(), Arc::clone(&remote), 3);

        device_a.put(&learner, &reviewed(1, at(8)), None).unwrap();
        assert!(device_b.list_all(&learner).unwrap().is_empty());

        let report = device_b.sync(&learner).unwrap();
        assert_eq!(report.pulled, 1);
        assert_eq!(device_b.list_all(&learner).unwrap().len(), 1);

        // Nothing new the second time
        assert_eq!(device_b.sync(&learner).unwrap().pulled, 0);
    }
}
