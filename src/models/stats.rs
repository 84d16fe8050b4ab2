//! Counters derived from a learner's review items.
//!
//! Nothing here is stored: every counter is recomputed from one snapshot of
//! the items, so counters read together always agree with each other.

use super::{LessonType, ReviewItem};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// The three counters shown next to the review button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    /// Items reviewed at least once.
    pub total_reviews: usize,
    pub mastered_count: usize,
    pub due_count: usize,
}

impl Aggregates {
    pub fn from_items(items: &[ReviewItem], now: DateTime<Utc>) -> Self {
        items.iter().fold(Self::default(), |mut acc, item| {
            if item.is_reviewed() {
                acc.total_reviews += 1;
            }
            if item.mastered {
                acc.mastered_count += 1;
            }
            if item.is_due(now) {
                acc.due_count += 1;
            }
            acc
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonBreakdown {
    pub items: usize,
    pub mastered: usize,
    pub due: usize,
}

/// Extended statistics for the progress screen.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    #[serde(flatten)]
    pub aggregates: Aggregates,
    /// Items whose latest review happened on the same UTC day as `now`.
    pub reviewed_today: usize,
    /// Reviewed but not yet mastered.
    pub learning_count: usize,
    pub average_ease: Option<f64>,
    pub by_lesson_type: BTreeMap<String, LessonBreakdown>,
}

impl ReviewStats {
    pub fn from_items(items: &[ReviewItem], now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let aggregates = Aggregates::from_items(items, now);

        let reviewed_today = items
            .iter()
            .filter_map(|item| item.last_reviewed_at)
            .filter(|at| at.date_naive() == today)
            .count();
        let learning_count = items
            .iter()
            .filter(|item| item.is_reviewed() && !item.mastered)
            .count();
        let average_ease = (!items.is_empty())
            .then(|| items.iter().map(|item| item.ease_factor).sum::<f64>() / items.len() as f64);

        let mut by_lesson_type: BTreeMap<String, LessonBreakdown> = BTreeMap::new();
        for item in items {
            let entry = by_lesson_type
                .entry(lesson_label(&item.key.lesson_type))
                .or_default();
            entry.items += 1;
            entry.mastered += usize::from(item.mastered);
            entry.due += usize::from(item.is_due(now));
        }

        Self {
            aggregates,
            reviewed_today,
            learning_count,
            average_ease,
            by_lesson_type,
        }
    }
}

fn lesson_label(lesson_type: &LessonType) -> String {
    lesson_type.as_str().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemKey, SchedulingPolicy};
    use chrono::{Duration, TimeZone};

    fn item(id: &str, lesson_type: LessonType, now: DateTime<Utc>) -> ReviewItem {
        ReviewItem::new(
            ItemKey::new(1, lesson_type, id),
            &SchedulingPolicy::default(),
            now,
        )
    }

    #[test]
    fn test_empty_collection_has_zero_counters() {
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 12, 0, 0).unwrap();
        assert_eq!(Aggregates::from_items(&[], now), Aggregates::default());

        let stats = ReviewStats::from_items(&[], now);
        assert_eq!(stats.aggregates.due_count, 0);
        assert_eq!(stats.average_ease, None);
    }

    #[test]
    fn test_counters_from_items() {
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 12, 0, 0).unwrap();

        let mut mastered = item("a", LessonType::Vowels, now);
        mastered.last_reviewed_at = Some(now - Duration::hours(2));
        mastered.mastered = true;
        mastered.due_date = now + Duration::days(30);

        let mut due = item("giyeok", LessonType::Consonants, now);
        due.last_reviewed_at = Some(now - Duration::days(1));
        due.due_date = now;

        let mut later = item("nieun", LessonType::Consonants, now);
        later.last_reviewed_at = Some(now - Duration::days(3));
        later.due_date = now + Duration::days(3);

        let stats = ReviewStats::from_items(&[mastered, due, later], now);
        assert_eq!(
            stats.aggregates,
            Aggregates {
                total_reviews: 3,
                mastered_count: 1,
                due_count: 1,
            }
        );
        assert_eq!(stats.reviewed_today, 1);
        assert_eq!(stats.learning_count, 2);
        assert_eq!(stats.by_lesson_type["consonants"].items, 2);
        assert_eq!(stats.by_lesson_type["consonants"].due, 1);
        assert_eq!(stats.by_lesson_type["vowels"].mastered, 1);
    }
}
