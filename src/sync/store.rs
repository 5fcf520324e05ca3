//! Durable storage contract for the queue.
//!
//! The queue calls [`ChangeStore::load`] once at construction and
//! [`ChangeStore::save`] with the full ordered list after every mutation.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;

use super::change::PendingChange;
use super::status::DeadLetter;

/// Storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be read or written.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Persisted data exists but cannot be decoded.
    #[error("persisted queue is corrupt: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => Self::Corrupt(e.to_string()),
            _ => Self::Unavailable(e.to_string()),
        }
    }
}

/// Durable storage owned by a single queue.
pub trait ChangeStore: Send + Sync {
    /// Load the persisted queue in order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if the data cannot be decoded.
    fn load(&self) -> Result<Vec<PendingChange>, StoreError>;

    /// Replace the persisted queue with `changes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save(&self, changes: &[PendingChange]) -> Result<(), StoreError>;

    /// Append a dead-lettered change to the persistent log.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn record_dead_letter(&self, _letter: &DeadLetter) -> Result<(), StoreError> {
        Ok(())
    }

    /// Load the dead-letter log, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn load_dead_letters(&self) -> Result<Vec<DeadLetter>, StoreError> {
        Ok(Vec::new())
    }

    /// Persist the time of the last fully successful pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save_last_sync(&self, _at: DateTime<Utc>) -> Result<(), StoreError> {
        Ok(())
    }

    /// Load the time of the last fully successful pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be read.
    fn load_last_sync(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(None)
    }
}

/// In-memory store, useful for tests and for hosts without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    changes: Mutex<Vec<PendingChange>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    saves: Mutex<usize>,
    fail_saves: Mutex<bool>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `changes`.
    #[must_use]
    pub fn with_changes(changes: Vec<PendingChange>) -> Self {
        Self {
            changes: Mutex::new(changes),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    /// Copy of the currently persisted queue.
    #[must_use]
    pub fn persisted(&self) -> Vec<PendingChange> {
        self.changes.lock().clone()
    }
}

impl ChangeStore for MemoryStore {
    fn load(&self) -> Result<Vec<PendingChange>, StoreError> {
        Ok(self.changes.lock().clone())
    }

    fn save(&self, changes: &[PendingChange]) -> Result<(), StoreError> {
        if *self.fail_saves.lock() {
            return Err(StoreError::Unavailable("save disabled".to_string()));
        }
        *self.changes.lock() = changes.to_vec();
        *self.saves.lock() += 1;
        Ok(())
    }

    fn record_dead_letter(&self, letter: &DeadLetter) -> Result<(), StoreError> {
        self.dead_letters.lock().push(letter.clone());
        Ok(())
    }

    fn load_dead_letters(&self) -> Result<Vec<DeadLetter>, StoreError> {
        Ok(self.dead_letters.lock().clone())
    }

    fn save_last_sync(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        *self.last_sync.lock() = Some(at);
        Ok(())
    }

    fn load_last_sync(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(*self.last_sync.lock())
    }
}
