//! SQLite persistence for review items
//!
//! Handles database initialization, compare-and-swap writes of review items,
//! and the simulated day offset used to try out spaced repetition by hand.

use super::{ReviewStore, StoredItem};
use crate::clock::Clock;
use crate::error::StoreError;
use crate::models::{ItemKey, LearnerId, LessonType, ReviewItem};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Initializes the SQLite schema
///
/// Creates the review item table and the app state table, and sets the
/// simulated day offset to zero if not already initialized.
pub fn init_database(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA synchronous = FULL;
         PRAGMA busy_timeout = 5000;",
    )?;

    // One row per learner and item key; timestamps are unix milliseconds
    conn.execute(
        "CREATE TABLE IF NOT EXISTS review_items (
            learner_id TEXT NOT NULL,
            level INTEGER NOT NULL,
            lesson_type TEXT NOT NULL,
            item_id TEXT NOT NULL,
            ease_factor REAL NOT NULL DEFAULT 2.5,
            interval_days INTEGER NOT NULL DEFAULT 0,
            repetitions INTEGER NOT NULL DEFAULT 0,
            due_date INTEGER NOT NULL,
            last_reviewed_at INTEGER,
            mastered INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL,
            PRIMARY KEY (learner_id, level, lesson_type, item_id)
        )",
        (),
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS review_items_due ON review_items (learner_id, due_date)",
        (),
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS app_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        (),
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO app_state (key, value) VALUES ('day_offset', '0')",
        (),
    )?;

    Ok(())
}

/// Returns the number of simulated days added to the wall clock
pub fn get_day_offset(conn: &Connection) -> rusqlite::Result<i64> {
    let value: String = conn.query_row(
        "SELECT value FROM app_state WHERE key = 'day_offset'",
        [],
        |row| row.get(0),
    )?;

    Ok(value.parse::<i64>().unwrap_or(0))
}

/// Current date as seen by the learner: wall clock plus the simulated offset
pub fn get_current_date(conn: &Connection) -> rusqlite::Result<DateTime<Utc>> {
    Ok(Utc::now() + Duration::days(get_day_offset(conn)?))
}

/// Advances the simulated date by 24 hours (for testing spaced repetition)
pub fn advance_day(conn: &Connection) -> rusqlite::Result<()> {
    let next = get_day_offset(conn)? + 1;
    conn.execute(
        "UPDATE app_state SET value = ?1 WHERE key = 'day_offset'",
        params![next.to_string()],
    )?;
    Ok(())
}

fn millis_to_datetime(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}

fn row_to_stored(row: &Row<'_>) -> rusqlite::Result<StoredItem> {
    let lesson_type: String = row.get(1)?;
    let last_reviewed_at: Option<i64> = row.get(7)?;

    Ok(StoredItem {
        item: ReviewItem {
            key: ItemKey::new(row.get(0)?, LessonType::from(lesson_type), row.get::<_, String>(2)?),
            ease_factor: row.get(3)?,
            interval_days: row.get(4)?,
            repetitions: row.get(5)?,
            due_date: millis_to_datetime(6, row.get(6)?)?,
            last_reviewed_at: last_reviewed_at
                .map(|millis| millis_to_datetime(7, millis))
                .transpose()?,
            mastered: row.get(8)?,
        },
        version: row.get::<_, i64>(9)? as u64,
    })
}

const SELECT_ITEM: &str = "SELECT level, lesson_type, item_id, ease_factor, interval_days,
        repetitions, due_date, last_reviewed_at, mastered, version
     FROM review_items";

/// SQLite-backed review store.
///
/// The connection is shared behind a mutex so a [`StoredClock`] can read the
/// simulated date from the same database.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`, creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_database(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Shared handle to the underlying connection.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database connection lock poisoned".to_string()))
    }
}

impl ReviewStore for SqliteStore {
    fn get(&self, learner: &LearnerId, key: &ItemKey) -> Result<Option<StoredItem>, StoreError> {
        let conn = self.lock()?;
        let stored = conn
            .query_row(
                &format!(
                    "{SELECT_ITEM} WHERE learner_id = ?1 AND level = ?2 AND lesson_type = ?3 AND item_id = ?4"
                ),
                params![learner.as_str(), key.level, key.lesson_type.as_str(), key.item_id],
                row_to_stored,
            )
            .optional()?;
        Ok(stored)
    }

    fn put(
        &self,
        learner: &LearnerId,
        item: &ReviewItem,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front so the version check and
        // the write cannot interleave with another connection's write
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let key = &item.key;
        let found: Option<i64> = tx
            .query_row(
                "SELECT version FROM review_items
                 WHERE learner_id = ?1 AND level = ?2 AND lesson_type = ?3 AND item_id = ?4",
                params![learner.as_str(), key.level, key.lesson_type.as_str(), key.item_id],
                |row| row.get(0),
            )
            .optional()?;
        let found = found.map(|version| version as u64);

        if found != expected_version {
            return Err(StoreError::Conflict {
                key: key.clone(),
                expected: expected_version,
                found,
            });
        }

        let version = found.unwrap_or(0) + 1;
        tx.execute(
            "INSERT INTO review_items (learner_id, level, lesson_type, item_id, ease_factor,
                interval_days, repetitions, due_date, last_reviewed_at, mastered, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT (learner_id, level, lesson_type, item_id) DO UPDATE SET
                ease_factor = excluded.ease_factor,
                interval_days = excluded.interval_days,
                repetitions = excluded.repetitions,
                due_date = excluded.due_date,
                last_reviewed_at = excluded.last_reviewed_at,
                mastered = excluded.mastered,
                version = excluded.version",
            params![
                learner.as_str(),
                key.level,
                key.lesson_type.as_str(),
                key.item_id,
                item.ease_factor,
                item.interval_days,
                item.repetitions,
                item.due_date.timestamp_millis(),
                item.last_reviewed_at.map(|at| at.timestamp_millis()),
                item.mastered,
                version as i64,
            ],
        )?;
        tx.commit()?;

        debug!(%learner, %key, version, "stored review item");
        Ok(version)
    }

    fn list_all(&self, learner: &LearnerId) -> Result<Vec<StoredItem>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_ITEM} WHERE learner_id = ?1"))?;
        let items = stmt
            .query_map(params![learner.as_str()], row_to_stored)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }
}

/// Clock reading the simulated date from the database's app state.
pub struct StoredClock {
    conn: Arc<Mutex<Connection>>,
}

impl StoredClock {
    pub fn new(store: &SqliteStore) -> Self {
        Self {
            conn: store.connection(),
        }
    }
}

impl Clock for StoredClock {
    fn now(&self) -> DateTime<Utc> {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(_) => {
                warn!("database connection lock poisoned, using wall clock");
                return Utc::now();
            }
        };
        get_current_date(&conn).unwrap_or_else(|e| {
            warn!("failed to read simulated date, using wall clock: {}", e);
            Utc::now()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SchedulingPolicy;
    use chrono::TimeZone;

    fn sample_item() -> ReviewItem {
        let reviewed = Utc.with_ymd_and_hms(2026, 6, 1, 7, 30, 15).unwrap();
        ReviewItem {
            key: ItemKey::new(4, LessonType::Other("idioms".to_string()), "break-a-leg"),
            ease_factor: 2.35,
            interval_days: 14,
            repetitions: 3,
            due_date: reviewed + Duration::days(14),
            last_reviewed_at: Some(reviewed),
            mastered: false,
        }
    }

    #[test]
    fn test_put_and_get_preserves_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let learner = LearnerId::from("hana");
        let item = sample_item();

        assert_eq!(store.put(&learner, &item, None).unwrap(), 1);

        let stored = store.get(&learner, &item.key).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.item, item);
    }

    #[test]
    fn test_never_reviewed_item_round_trips_null_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();
        let learner = LearnerId::from("hana");
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let item = ReviewItem::new(
            ItemKey::new(1, LessonType::Vowels, "eo"),
            &SchedulingPolicy::default(),
            now,
        );

        store.put(&learner, &item, None).unwrap();
        let stored = store.get(&learner, &item.key).unwrap().unwrap();
        assert_eq!(stored.item.last_reviewed_at, None);
    }

    #[test]
    fn test_stale_version_is_rejected_without_writing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let learner = LearnerId::from("hana");
        let item = sample_item();
        store.put(&learner, &item, None).unwrap();

        let mut changed = item.clone();
        changed.repetitions = 4;
        assert_eq!(store.put(&learner, &changed, Some(1)).unwrap(), 2);

        let mut stale = item.clone();
        stale.repetitions = 99;
        assert!(matches!(
            store.put(&learner, &stale, Some(1)),
            Err(StoreError::Conflict { expected: Some(1), found: Some(2), .. })
        ));
        assert!(matches!(
            store.put(&learner, &stale, None),
            Err(StoreError::Conflict { found: Some(2), .. })
        ));

        let stored = store.get(&learner, &item.key).unwrap().unwrap();
        assert_eq!(stored.item.repetitions, 4);
        assert_eq!(store.list_all(&learner).unwrap().len(), 1);
    }

    #[test]
    fn test_list_all_is_scoped_to_learner() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(&LearnerId::from("hana"), &sample_item(), None).unwrap();

        assert_eq!(store.list_all(&LearnerId::from("hana")).unwrap().len(), 1);
        assert!(store.list_all(&LearnerId::from("dong")).unwrap().is_empty());
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("reviews.sqlite3");
        let learner = LearnerId::from("hana");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.put(&learner, &sample_item(), None).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let items = reopened.list_all(&learner).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item, sample_item());
    }

    #[test]
    fn test_advance_day_moves_stored_clock() {
        let store = SqliteStore::open_in_memory().unwrap();
        let clock = StoredClock::new(&store);

        let before = clock.now();
        {
            let conn = store.connection();
            let conn = conn.lock().unwrap();
            assert_eq!(get_day_offset(&conn).unwrap(), 0);
            advance_day(&conn).unwrap();
            advance_day(&conn).unwrap();
            assert_eq!(get_day_offset(&conn).unwrap(), 2);
        }
        let after = clock.now();

        assert!(after - before >= Duration::days(2));
        assert!(after - before < Duration::days(3));
    }
}
