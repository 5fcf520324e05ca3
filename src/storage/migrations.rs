//! Database migrations for cradlesync.
//!
//! Each migration is a function that upgrades the schema by one version.
//! Migrations are run automatically when the database is opened.

use rusqlite::Connection;

use crate::error::Error;

/// Current schema version.
const CURRENT_VERSION: i32 = 2;

/// Get the current schema version from the database.
///
/// Returns 0 if no version has been set (new database).
pub fn get_version(conn: &Connection) -> Result<i32, Error> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| Error::Database(format!("Failed to get schema version: {e}")))
}

/// Set the schema version in the database.
fn set_version(conn: &Connection, version: i32) -> Result<(), Error> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| Error::Database(format!("Failed to set schema version: {e}")))
}

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<(), Error> {
    let current = get_version(conn)?;

    if current >= CURRENT_VERSION {
        return Ok(());
    }

    for version in (current + 1)..=CURRENT_VERSION {
        run_migration(conn, version)?;
        set_version(conn, version)?;
    }

    Ok(())
}

/// Run a specific migration.
fn run_migration(conn: &Connection, version: i32) -> Result<(), Error> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::Database(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: pending queue and sync metadata.
///
/// `position` carries queue order; `id` is the change's opaque token.
fn migrate_v1(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS pending_changes (
            position INTEGER PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            change_type TEXT NOT NULL,
            payload BLOB NOT NULL,
            created_at TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_attempt_at TEXT,
            last_error TEXT
        );

        CREATE TABLE IF NOT EXISTS sync_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )
    .map_err(|e| Error::Database(format!("Migration v1 failed: {e}")))
}

/// Migration v2: dead-letter log.
fn migrate_v2(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS dead_letters (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL,
            change_type TEXT NOT NULL,
            payload BLOB NOT NULL,
            created_at TEXT NOT NULL,
            retry_count INTEGER NOT NULL,
            last_attempt_at TEXT,
            last_error TEXT,
            reason TEXT NOT NULL,
            dead_lettered_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_dead_letters_id
        ON dead_letters(id);
        ",
    )
    .map_err(|e| Error::Database(format!("Migration v2 failed: {e}")))
}
