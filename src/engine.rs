//! Scheduling engine: records reviews and answers due-set and counter queries.
//!
//! The engine holds no per-learner state. Every call names its learner and
//! works from what the store currently holds, so retrying a failed
//! `record_review` recomputes from persisted state instead of replaying a
//! client-side delta.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::database::{ReviewStore, WriteOutcome, write_last_wins};
use crate::error::Result;
use crate::models::sm2::calculate_next_review;
use crate::models::{
    Aggregates, ItemKey, LearnerId, Quality, ReviewItem, ReviewStats, SchedulingPolicy,
};

/// Due set and counters taken from one store snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewOverview {
    pub due_items: Vec<ReviewItem>,
    pub aggregates: Aggregates,
}

pub struct ReviewEngine {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
    policy: SchedulingPolicy,
    max_write_attempts: u32,
}

impl ReviewEngine {
    pub fn new(store: Arc<dyn ReviewStore>, clock: Arc<dyn Clock>, config: &SchedulerConfig) -> Self {
        Self {
            store,
            clock,
            policy: config.policy,
            max_write_attempts: config.max_write_attempts,
        }
    }

    /// Current time at the precision the stores keep (milliseconds).
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(3)
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    /// Records one review of `key` and returns the item's new state.
    ///
    /// The rating is validated before the store is touched. The first review
    /// of a key creates its item. If another device stored a later review of
    /// the same item in the meantime, that review is kept and returned.
    pub fn record_review(&self, learner: &LearnerId, key: &ItemKey, quality: u8) -> Result<ReviewItem> {
        let quality = Quality::try_from(quality)?;
        let now = self.now();

        let (current, expected_version) = match self.store.get(learner, key)? {
            Some(stored) => (stored.item, Some(stored.version)),
            None => {
                debug!(%learner, %key, "first review, creating item");
                (ReviewItem::new(key.clone(), &self.policy, now), None)
            }
        };

        let next = calculate_next_review(&current, quality, now, &self.policy)?;
        debug!(
            %learner,
            %key,
            %quality,
            ease = next.ease_factor,
            interval = next.interval_days,
            repetitions = next.repetitions,
            "computed schedule"
        );

        match write_last_wins(
            &*self.store,
            learner,
            &next,
            expected_version,
            self.max_write_attempts,
        )? {
            WriteOutcome::Written(stored) => {
                info!(
                    %learner,
                    %key,
                    %quality,
                    due = %stored.item.due_date,
                    mastered = stored.item.mastered,
                    "review recorded"
                );
                Ok(stored.item)
            }
            WriteOutcome::Superseded(stored) => {
                warn!(%learner, %key, "a later review from another device was kept");
                Ok(stored.item)
            }
        }
    }

    pub fn get_item(&self, learner: &LearnerId, key: &ItemKey) -> Result<Option<ReviewItem>> {
        Ok(self.store.get(learner, key)?.map(|stored| stored.item))
    }

    /// Items due at `now`, highest forgetting risk first. Empty when nothing is due.
    pub fn get_due_items(&self, learner: &LearnerId, now: DateTime<Utc>) -> Result<Vec<ReviewItem>> {
        Ok(select_due(self.snapshot(learner)?, now))
    }

    pub fn get_due_count(&self, learner: &LearnerId, now: DateTime<Utc>) -> Result<usize> {
        Ok(self
            .snapshot(learner)?
            .iter()
            .filter(|item| item.is_due(now))
            .count())
    }

    pub fn get_aggregates(&self, learner: &LearnerId, now: DateTime<Utc>) -> Result<Aggregates> {
        Ok(Aggregates::from_items(&self.snapshot(learner)?, now))
    }

    /// Due set and counters computed from the same read.
    pub fn get_overview(&self, learner: &LearnerId, now: DateTime<Utc>) -> Result<ReviewOverview> {
        let items = self.snapshot(learner)?;
        let aggregates = Aggregates::from_items(&items, now);
        Ok(ReviewOverview {
            due_items: select_due(items, now),
            aggregates,
        })
    }

    pub fn get_stats(&self, learner: &LearnerId, now: DateTime<Utc>) -> Result<ReviewStats> {
        Ok(ReviewStats::from_items(&self.snapshot(learner)?, now))
    }

    fn snapshot(&self, learner: &LearnerId) -> Result<Vec<ReviewItem>> {
        Ok(self
            .store
            .list_all(learner)?
            .into_iter()
            .map(|stored| stored.item)
            .collect())
    }
}

/// Keeps the items due at `now` (inclusive) ordered by due date, then by
/// last review with never-reviewed items first, then by key.
pub fn select_due(items: Vec<ReviewItem>, now: DateTime<Utc>) -> Vec<ReviewItem> {
    let mut due: Vec<ReviewItem> = items.into_iter().filter(|item| item.is_due(now)).collect();
    due.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.last_reviewed_at.cmp(&b.last_reviewed_at))
            .then_with(|| a.key.cmp(&b.key))
    });
    due
}
