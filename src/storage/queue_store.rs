//! `SQLite`-backed [`ChangeStore`].
//!
//! `save` rewrites `pending_changes` inside one transaction, so a crash leaves
//! either the previous or the new queue on disk.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, OptionalExtension, Row};

use super::Database;
use crate::error::Error;
use crate::sync::{ChangeId, ChangeStore, DeadLetter, PendingChange, StoreError};

const LAST_SYNC_KEY: &str = "last_sync_at";

/// Queue store persisted in the cradlesync database.
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    /// Open the store in the default database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open() -> Result<Self, Error> {
        Ok(Self::with_database(Database::open()?))
    }

    /// Open the store at a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_at(path: &std::path::Path) -> Result<Self, Error> {
        Ok(Self::with_database(Database::open_at(path)?))
    }

    /// Create a store with an existing database connection.
    #[must_use]
    pub fn with_database(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }
}

impl ChangeStore for SqliteStore {
    fn load(&self) -> Result<Vec<PendingChange>, StoreError> {
        let db = self.db.lock();
        let mut stmt = db.connection().prepare(
            r"SELECT id, change_type, payload, created_at, retry_count,
                     last_attempt_at, last_error
              FROM pending_changes
              ORDER BY position ASC",
        )?;

        let rows = stmt.query_map([], raw_change)?;
        let mut changes = Vec::new();
        for row in rows {
            changes.push(row?.decode()?);
        }
        Ok(changes)
    }

    fn save(&self, changes: &[PendingChange]) -> Result<(), StoreError> {
        let mut db = self.db.lock();
        let tx = db.connection_mut().transaction()?;
        tx.execute("DELETE FROM pending_changes", [])?;
        {
            let mut insert = tx.prepare(
                r"INSERT INTO pending_changes
                  (position, id, change_type, payload, created_at, retry_count,
                   last_attempt_at, last_error)
                  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (position, change) in changes.iter().enumerate() {
                insert.execute(params![
                    i64::try_from(position).unwrap_or(i64::MAX),
                    change.id.as_str(),
                    change.change_type.as_str(),
                    change.payload,
                    change.created_at.to_rfc3339(),
                    change.retry_count,
                    change.last_attempt_at.map(|t| t.to_rfc3339()),
                    change.last_error,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn record_dead_letter(&self, letter: &DeadLetter) -> Result<(), StoreError> {
        let db = self.db.lock();
        let change = &letter.change;
        db.connection().execute(
            r"INSERT INTO dead_letters
              (id, change_type, payload, created_at, retry_count, last_attempt_at,
               last_error, reason, dead_lettered_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                change.id.as_str(),
                change.change_type.as_str(),
                change.payload,
                change.created_at.to_rfc3339(),
                change.retry_count,
                change.last_attempt_at.map(|t| t.to_rfc3339()),
                change.last_error,
                letter.reason,
                letter.dead_lettered_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_dead_letters(&self) -> Result<Vec<DeadLetter>, StoreError> {
        let db = self.db.lock();
        let mut stmt = db.connection().prepare(
            r"SELECT id, change_type, payload, created_at, retry_count,
                     last_attempt_at, last_error, reason, dead_lettered_at
              FROM dead_letters
              ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((raw_change(row)?, row.get::<_, String>(7)?, row.get::<_, String>(8)?))
        })?;

        let mut letters = Vec::new();
        for row in rows {
            let (raw, reason, at) = row?;
            letters.push(DeadLetter {
                change: raw.decode()?,
                reason,
                dead_lettered_at: parse_timestamp(&at)?,
            });
        }
        Ok(letters)
    }

    fn save_last_sync(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let db = self.db.lock();
        db.connection().execute(
            "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?1, ?2)",
            params![LAST_SYNC_KEY, at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn load_last_sync(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let db = self.db.lock();
        let value: Option<String> = db
            .connection()
            .query_row(
                "SELECT value FROM sync_meta WHERE key = ?1",
                [LAST_SYNC_KEY],
                |row| row.get(0),
            )
            .optional()?;
        value.as_deref().map(parse_timestamp).transpose()
    }
}

/// Row as stored, before validation.
struct RawChange {
    id: String,
    change_type: String,
    payload: Vec<u8>,
    created_at: String,
    retry_count: i64,
    last_attempt_at: Option<String>,
    last_error: Option<String>,
}

impl RawChange {
    fn decode(self) -> Result<PendingChange, StoreError> {
        let change_type = self
            .change_type
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("change {}: {e}", self.id)))?;
        let retry_count = u32::try_from(self.retry_count).map_err(|_| {
            StoreError::Corrupt(format!(
                "change {}: invalid retry count {}",
                self.id, self.retry_count
            ))
        })?;

        Ok(PendingChange {
            created_at: parse_timestamp(&self.created_at)?,
            last_attempt_at: self
                .last_attempt_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            id: ChangeId::from(self.id),
            change_type,
            payload: self.payload,
            retry_count,
            last_error: self.last_error,
        })
    }
}

fn raw_change(row: &Row<'_>) -> Result<RawChange, rusqlite::Error> {
    Ok(RawChange {
        id: row.get(0)?,
        change_type: row.get(1)?,
        payload: row.get(2)?,
        created_at: row.get(3)?,
        retry_count: row.get(4)?,
        last_attempt_at: row.get(5)?,
        last_error: row.get(6)?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ChangeType;

    fn create_test_store() -> SqliteStore {
        SqliteStore::with_database(Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_save_and_load() {
        let store = create_test_store();
        let mut failed = PendingChange::with_id("b", ChangeType::MilestoneUpdate, vec![0, 1, 2]);
        failed.record_failure("timeout", Utc::now());
        let changes = vec![
            PendingChange::with_id("a", ChangeType::BabyUpdate, b"{}".to_vec()),
            failed,
            PendingChange::with_id("c", ChangeType::EmergencyContact, Vec::new()),
        ];

        store.save(&changes).unwrap();
        assert_eq!(store.load().unwrap(), changes);
    }

    #[test]
    fn test_save_replaces_previous_queue() {
        let store = create_test_store();
        store
            .save(&[
                PendingChange::with_id("a", ChangeType::BabyUpdate, Vec::new()),
                PendingChange::with_id("b", ChangeType::BabyUpdate, Vec::new()),
            ])
            .unwrap();
        store
            .save(&[PendingChange::with_id("b", ChangeType::BabyUpdate, Vec::new())])
            .unwrap();

        let ids: Vec<_> = store.load().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![ChangeId::from("b")]);
    }

    #[test]
    fn test_unknown_change_type_is_corrupt() {
        let store = create_test_store();
        store
            .db
            .lock()
            .connection()
            .execute(
                "INSERT INTO pending_changes (position, id, change_type, payload, created_at)
                 VALUES (0, 'x', 'add-todo', x'', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();

        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_bad_timestamp_is_corrupt() {
        let store = create_test_store();
        store
            .db
            .lock()
            .connection()
            .execute(
                "INSERT INTO pending_changes (position, id, change_type, payload, created_at)
                 VALUES (0, 'x', 'baby-update', x'', 'yesterday')",
                [],
            )
            .unwrap();

        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_dead_letters() {
        let store = create_test_store();
        let letter = DeadLetter {
            change: PendingChange::with_id("a", ChangeType::AppointmentDelete, b"{}".to_vec()),
            reason: "rejected with status 410: gone".to_string(),
            dead_lettered_at: Utc::now(),
        };

        store.record_dead_letter(&letter).unwrap();
        let loaded = store.load_dead_letters().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].change, letter.change);
        assert_eq!(loaded[0].reason, letter.reason);
    }

    #[test]
    fn test_last_sync() {
        let store = create_test_store();
        assert_eq!(store.load_last_sync().unwrap(), None);

        let now = Utc::now();
        store.save_last_sync(now).unwrap();
        store.save_last_sync(now).unwrap();
        assert_eq!(store.load_last_sync().unwrap(), Some(now));
    }
}
