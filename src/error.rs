//! Error types shared by the review store, the scheduling engine and sessions.

use crate::models::ItemKey;

/// A specialized `Result` type for engine and session operations.
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Failures raised by a [`ReviewStore`](crate::database::ReviewStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached (offline, remote error, poisoned lock).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A compare-and-swap write found a different version than the writer expected.
    #[error("version conflict on {key}: expected {expected:?}, found {found:?}")]
    Conflict {
        key: ItemKey,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Failures surfaced to callers of the scheduling engine and review sessions.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Rating outside `{1, 3, 5}`. Nothing was read or written.
    #[error("invalid quality rating {0}: expected 1 (forgot), 3 (hard) or 5 (easy)")]
    InvalidQuality(u8),

    /// A rating was submitted for an item that is not the session's current item.
    #[error("{key} is not the current item of this session")]
    OutOfSequence { key: ItemKey },

    /// The next due date lies beyond the calendar chrono can represent.
    #[error("due date of {key} is out of range after a {interval_days} day interval")]
    DueDateOutOfRange { key: ItemKey, interval_days: u32 },

    /// The review could not be persisted; retrying the identical call is safe.
    #[error("review store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}
