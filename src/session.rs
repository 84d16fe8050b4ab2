//! Review session management for spaced repetition practice.
//! A session walks a fixed snapshot of the due set, one item at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::engine::{ReviewEngine, ReviewOverview};
use crate::error::{Result, ReviewError};
use crate::models::{ContentResolver, ItemKey, LearnerId, PresentedItem, ReviewItem};

/// UI-facing entry point for one learner: the dashboard counters and the
/// due list between sessions, and the factory for review sessions.
pub struct SessionController {
    engine: Arc<ReviewEngine>,
    learner: LearnerId,
    resolver: Option<Arc<dyn ContentResolver>>,
    overview: ReviewOverview,
}

impl SessionController {
    pub fn new(engine: Arc<ReviewEngine>, learner: LearnerId) -> Self {
        Self {
            engine,
            learner,
            resolver: None,
            overview: ReviewOverview::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn learner(&self) -> &LearnerId {
        &self.learner
    }

    /// Re-pulls the due list and counters. Sessions already started keep
    /// their own snapshot.
    pub fn refresh_reviews(&mut self) -> Result<()> {
        self.overview = self.engine.get_overview(&self.learner, self.engine.now())?;
        Ok(())
    }

    /// Due items as of the last refresh.
    pub fn due_items(&self) -> &[ReviewItem] {
        &self.overview.due_items
    }

    pub fn total_reviews(&self) -> usize {
        self.overview.aggregates.total_reviews
    }

    pub fn mastered_count(&self) -> usize {
        self.overview.aggregates.mastered_count
    }

    /// Live count straight from the store.
    pub fn get_due_count(&self) -> Result<usize> {
        self.engine.get_due_count(&self.learner, self.engine.now())
    }

    pub fn record_review(&self, key: &ItemKey, quality: u8) -> Result<ReviewItem> {
        self.engine.record_review(&self.learner, key, quality)
    }

    /// Snapshots the current due set into a new session.
    pub fn start_session(&self) -> Result<ReviewSession> {
        let started_at = self.engine.now();
        let due = self.engine.get_due_items(&self.learner, started_at)?;

        let items = due
            .into_iter()
            .map(|item| {
                let content = self.resolver.as_ref().and_then(|resolver| {
                    resolver
                        .resolve_content(&item.key)
                        .map_err(|e| warn!(key = %item.key, "content unavailable: {}", e))
                        .ok()
                });
                PresentedItem::new(item, content)
            })
            .collect();

        Ok(ReviewSession {
            engine: Arc::clone(&self.engine),
            learner: self.learner.clone(),
            items,
            current_index: 0,
            started_at,
        })
    }
}

/// One pass over a fixed sequence of due items.
///
/// Reviewed items are never re-inserted, even when their new due date has
/// already passed; they come back in a later session.
pub struct ReviewSession {
    engine: Arc<ReviewEngine>,
    learner: LearnerId,
    items: Vec<PresentedItem>,
    current_index: usize,
    started_at: DateTime<Utc>,
}

impl ReviewSession {
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn items(&self) -> &[PresentedItem] {
        &self.items
    }

    pub fn current_item(&self) -> Option<&PresentedItem> {
        self.items.get(self.current_index)
    }

    /// Records the rating for the current item and moves to the next one.
    ///
    /// `key` must name the current item. On any error the session stays on
    /// the same item so the rating can be retried.
    pub fn submit_rating(&mut self, key: &ItemKey, quality: u8) -> Result<ReviewItem> {
        let current = self
            .items
            .get_mut(self.current_index)
            .filter(|presented| &presented.item.key == key)
            .ok_or_else(|| ReviewError::OutOfSequence { key: key.clone() })?;

        let outcome = self.engine.record_review(&self.learner, key, quality)?;
        current.mark_reviewed(outcome.clone());
        self.current_index += 1;
        Ok(outcome)
    }

    pub fn reviewed_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_reviewed()).count()
    }

    pub fn total_count(&self) -> usize {
        self.items.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.total_count() - self.current_index.min(self.total_count())
    }

    pub fn is_completed(&self) -> bool {
        self.current_index >= self.items.len()
    }

    pub fn progress_message(&self) -> String {
        if self.is_completed() {
            format!("Session complete: {} reviewed", self.reviewed_count())
        } else {
            format!(
                "Item {} of {}",
                self.current_index + 1,
                self.total_count()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SchedulerConfig;
    use crate::database::{MemoryStore, ReviewStore};
    use crate::models::{Catalog, LessonType};
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        controller: SessionController,
    }

    /// Three consonants reviewed once the day before, all due an hour into the day.
    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(start() - Duration::days(1)));
        let engine = Arc::new(ReviewEngine::new(
            store.clone(),
            clock.clone(),
            &SchedulerConfig::default(),
        ));
        let learner = LearnerId::from("seo");

        for id in ["giyeok", "nieun", "digeut"] {
            engine
                .record_review(&learner, &ItemKey::new(1, LessonType::Consonants, id), 5)
                .unwrap();
            clock.advance(Duration::minutes(1));
        }
        clock.set(start() + Duration::hours(1));

        let controller = SessionController::new(engine, learner).with_resolver(Arc::new(Catalog::sample()));
        Fixture {
            store,
            clock,
            controller,
        }
    }

    fn current_key(session: &ReviewSession) -> ItemKey {
        session.current_item().unwrap().item.key.clone()
    }

    #[test]
    fn test_session_walks_snapshot_in_due_order() {
        let fx = fixture();
        let mut session = fx.controller.start_session().unwrap();
        assert_eq!(session.total_count(), 3);
        assert_eq!(session.current_item().unwrap().display_text(), "ㄱ");

        let mut seen = Vec::new();
        while !session.is_completed() {
            let key = current_key(&session);
            seen.push(key.item_id.clone());
            session.submit_rating(&key, 5).unwrap();
        }

        assert_eq!(seen, vec!["giyeok", "nieun", "digeut"]);
        assert_eq!(session.reviewed_count(), 3);
        assert_eq!(session.remaining_count(), 0);
        assert!(session.current_item().is_none());
    }

    #[test]
    fn test_lapsed_item_is_not_reinserted() {
        let fx = fixture();
        let mut session = fx.controller.start_session().unwrap();

        let first = current_key(&session);
        let outcome = session.submit_rating(&first, 1).unwrap();
        assert_eq!(outcome.repetitions, 0);

        // Even if the item is due again before the session ends, it is not shown twice
        fx.clock.advance(Duration::days(2));
        let mut remaining = Vec::new();
        while let Some(presented) = session.current_item() {
            let key = presented.item.key.clone();
            remaining.push(key.clone());
            session.submit_rating(&key, 3).unwrap();
        }
        assert_eq!(remaining.len(), 2);
        assert!(!remaining.contains(&first));
    }

    #[test]
    fn test_invalid_rating_does_not_advance() {
        let fx = fixture();
        let mut session = fx.controller.start_session().unwrap();
        let key = current_key(&session);

        assert!(matches!(
            session.submit_rating(&key, 4),
            Err(ReviewError::InvalidQuality(4))
        ));
        assert_eq!(current_key(&session), key);
        assert_eq!(session.reviewed_count(), 0);
    }

    #[test]
    fn test_store_failure_does_not_advance() {
        let fx = fixture();
        let mut session = fx.controller.start_session().unwrap();
        let key = current_key(&session);

        fx.store.set_available(false);
        assert!(matches!(
            session.submit_rating(&key, 5),
            Err(ReviewError::StoreUnavailable(_))
        ));
        assert_eq!(current_key(&session), key);

        fx.store.set_available(true);
        session.submit_rating(&key, 5).unwrap();
        assert_eq!(session.reviewed_count(), 1);
    }

    #[test]
    fn test_rating_for_other_item_is_rejected() {
        let fx = fixture();
        let mut session = fx.controller.start_session().unwrap();
        let not_current = session.items()[2].item.key.clone();

        assert!(matches!(
            session.submit_rating(&not_current, 5),
            Err(ReviewError::OutOfSequence { .. })
        ));
        let learner = fx.controller.learner().clone();
        let stored = fx.store.get(&learner, &not_current).unwrap().unwrap();
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn test_refresh_does_not_touch_running_session() {
        let mut fx = fixture();
        let mut session = fx.controller.start_session().unwrap();

        let key = current_key(&session);
        session.submit_rating(&key, 5).unwrap();

        fx.controller.refresh_reviews().unwrap();
        assert_eq!(fx.controller.due_items().len(), 2);
        assert_eq!(fx.controller.get_due_count().unwrap(), 2);
        assert_eq!(fx.controller.total_reviews(), 3);

        assert_eq!(session.total_count(), 3);
        assert_eq!(session.remaining_count(), 2);
    }

    #[test]
    fn test_missing_content_leaves_bare_item() {
        let fx = fixture();
        let learner = fx.controller.learner().clone();
        fx.controller
            .record_review(&ItemKey::new(9, LessonType::Advanced, "not-in-catalog"), 1)
            .unwrap();
        fx.clock.advance(Duration::days(1));

        let session = fx.controller.start_session().unwrap();
        let bare = session
            .items()
            .iter()
            .find(|presented| presented.item.key.item_id == "not-in-catalog")
            .unwrap();
        assert!(bare.content.is_none());
        assert_eq!(bare.display_text(), "not-in-catalog");
        assert_eq!(fx.store.list_all(&learner).unwrap().len(), 4);
    }

    #[test]
    fn test_empty_session_is_complete() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let engine = Arc::new(ReviewEngine::new(store, clock, &SchedulerConfig::default()));
        let mut controller = SessionController::new(engine, LearnerId::from("new"));

        controller.refresh_reviews().unwrap();
        assert!(controller.due_items().is_empty());
        assert_eq!(controller.get_due_count().unwrap(), 0);

        let session = controller.start_session().unwrap();
        assert_eq!(session.started_at(), start());
        assert!(session.is_completed());
        assert_eq!(session.progress_message(), "Session complete: 0 reviewed");
    }
}
