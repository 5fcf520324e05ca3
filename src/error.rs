//! Error types for cradlesync.
//!
//! Component errors (`QueueError`, `StoreError`, `ApplyError`) live next to the
//! code that raises them. This module holds the crate-level error used by the
//! configuration layer and the CLI.

use thiserror::Error;

use crate::sync::{ApplyError, QueueError, StoreError};

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// `SQLite` failure outside of the queue store contract.
    #[error("Database error: {0}")]
    Database(String),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Bad command-line input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A requested item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Queue operation failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Queue storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote API failure.
    #[error("Remote error: {0}")]
    Remote(#[from] ApplyError),

    /// A background sync task panicked or was aborted.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidInput(_) => 2,
            Self::NotFound(_) => 3,
            Self::Queue(QueueError::Duplicate(_)) => 4,
            _ => 1,
        }
    }
}
