//! `SQLite` database connection and operations.
//!
//! The database is stored at `~/.cradlesync/queue.db` and contains tables for:
//! - Pending changes, in queue order
//! - Dead-lettered changes
//! - Sync metadata (last successful pass)

use rusqlite::Connection;

use crate::config::Paths;
use crate::error::Error;

use super::migrations;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at the default location.
    ///
    /// Creates the database file and runs migrations if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open() -> Result<Self, Error> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        Self::open_at(&paths.database)
    }

    /// Open the database at a specific path.
    ///
    /// Creates the database file and runs migrations if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_at(path: &std::path::Path) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(|e| {
            Error::Database(format!("Failed to open database {}: {e}", path.display()))
        })?;

        // The CLI reads while a daemon may be writing
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(format!("Failed to enable WAL: {e}")))?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Open an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("Failed to open in-memory database: {e}")))?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Run database migrations.
    fn migrate(&self) -> Result<(), Error> {
        migrations::run(&self.conn)
    }

    /// Get the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, Error> {
        migrations::get_version(&self.conn)
    }

    /// Get a reference to the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference to the underlying connection, for transactions.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
