//! SM-2 style scheduling with a three-grade input.
//!
//! The rules applied to a review:
//! - FORGOT is a lapse: repetitions reset to 0, the interval drops back to the first
//!   interval and the ease factor loses `lapse_penalty`
//! - HARD and EASY are successes: repetitions grow by one and the interval follows
//!   1 day → 6 days → previous interval × ease factor
//! - The multiplier is the ease factor held *before* the review; the grade then moves
//!   the ease (EASY up, HARD down). The very first success is a learning step and
//!   leaves the ease untouched
//! - The ease factor never falls below `min_ease` and the interval never exceeds
//!   `max_interval_days`
//! - An item is mastered at `mastery_repetitions` consecutive successes with an ease
//!   of at least `mastery_ease`

use super::{Quality, ReviewItem};
use crate::error::{Result, ReviewError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tunable constants of the scheduling policy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulingPolicy {
    pub initial_ease: f64,
    pub min_ease: f64,
    pub lapse_penalty: f64,
    pub easy_bonus: f64,
    pub hard_penalty: f64,
    pub first_interval_days: u32,
    pub second_interval_days: u32,
    /// Ceiling on any interval, roughly a century by default.
    pub max_interval_days: u32,
    pub mastery_repetitions: u32,
    pub mastery_ease: f64,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            min_ease: 1.3,
            lapse_penalty: 0.2,
            easy_bonus: 0.15,
            hard_penalty: 0.05,
            first_interval_days: 1,
            second_interval_days: 6,
            max_interval_days: 36_500,
            mastery_repetitions: 5,
            mastery_ease: 2.5,
        }
    }
}

/// Ease factors are kept at four decimal places so repeated small deltas
/// do not drift away from the values a learner would compute by hand.
fn normalize_ease(ease: f64, floor: f64) -> f64 {
    ((ease * 10_000.0).round() / 10_000.0).max(floor)
}

/// Computes the state of `item` after a review graded `quality` at `now`.
///
/// Fails only when the due date would fall outside the representable range.
pub fn calculate_next_review(
    item: &ReviewItem,
    quality: Quality,
    now: DateTime<Utc>,
    policy: &SchedulingPolicy,
) -> Result<ReviewItem> {
    let (ease_factor, interval_days, repetitions) = if quality.is_lapse() {
        (
            normalize_ease(item.ease_factor - policy.lapse_penalty, policy.min_ease),
            policy.first_interval_days,
            0,
        )
    } else {
        let repetitions = item.repetitions.saturating_add(1);
        let interval_days = match repetitions {
            1 => policy.first_interval_days,
            2 => policy.second_interval_days,
            // Float-to-int `as` saturates; growth is never below the previous interval
            _ => ((item.interval_days as f64 * item.ease_factor).round() as u32)
                .max(item.interval_days)
                .max(policy.first_interval_days),
        }
        .min(policy.max_interval_days);

        let ease_factor = if item.repetitions == 0 {
            normalize_ease(item.ease_factor, policy.min_ease)
        } else {
            let delta = match quality {
                Quality::Easy => policy.easy_bonus,
                _ => -policy.hard_penalty,
            };
            normalize_ease(item.ease_factor + delta, policy.min_ease)
        };

        (ease_factor, interval_days, repetitions)
    };

    let mastered =
        repetitions >= policy.mastery_repetitions && ease_factor >= policy.mastery_ease;

    let due_date = now
        .checked_add_signed(Duration::days(i64::from(interval_days)))
        .ok_or_else(|| ReviewError::DueDateOutOfRange {
            key: item.key.clone(),
            interval_days,
        })?;

    Ok(ReviewItem {
        key: item.key.clone(),
        ease_factor,
        interval_days,
        repetitions,
        due_date,
        last_reviewed_at: Some(now),
        mastered,
    })
}
