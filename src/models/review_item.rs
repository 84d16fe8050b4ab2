use super::{ItemKey, SchedulingPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-learner scheduling record for one item.
///
/// Serializes to the flat persisted shape
/// `{level, lessonType, itemId, easeFactor, intervalDays, repetitions, dueDate, lastReviewedAt, mastered}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    #[serde(flatten)]
    pub key: ItemKey,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub due_date: DateTime<Utc>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub mastered: bool,
}

impl ReviewItem {
    /// A never-reviewed item. Only materialized when its first review is recorded.
    pub fn new(key: ItemKey, policy: &SchedulingPolicy, now: DateTime<Utc>) -> Self {
        Self {
            key,
            ease_factor: policy.initial_ease,
            interval_days: 0,
            repetitions: 0,
            due_date: now,
            last_reviewed_at: None,
            mastered: false,
        }
    }

    /// Boundary inclusive: an item due exactly at `now` is due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date <= now
    }

    pub fn is_reviewed(&self) -> bool {
        self.last_reviewed_at.is_some()
    }
}
