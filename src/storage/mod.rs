//! Storage layer for cradlesync.
//!
//! This module provides SQLite-based persistence for:
//! - The pending change queue
//! - Dead-lettered changes
//! - Sync metadata

mod database;
mod migrations;
mod queue_store;

pub use database::Database;
pub use queue_store::SqliteStore;
