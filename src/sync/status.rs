//! Sync status and the events the queue publishes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::change::PendingChange;

/// State of the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SyncStatus {
    /// No pass running
    #[default]
    Idle,
    /// A pass is in flight
    Syncing,
    /// The last pass drained its snapshot
    Succeeded,
    /// The last pass stopped early or dead-lettered a change
    Failed(String),
}

impl SyncStatus {
    /// Whether this is a reporting state left behind by a finished pass.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    /// Whether a pass is running.
    #[must_use]
    pub const fn is_syncing(&self) -> bool {
        matches!(self, Self::Syncing)
    }

    /// Failure reason, if the last pass failed.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Syncing => f.write_str("syncing"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// A change abandoned after exhausting its retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The change as it was when abandoned
    pub change: PendingChange,
    /// Error from the final attempt
    pub reason: String,
    /// When it was abandoned
    pub dead_lettered_at: DateTime<Utc>,
}

/// Notification published by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Status transitioned
    StatusChanged(SyncStatus),
    /// A change was permanently dropped
    DeadLettered(DeadLetter),
    /// A persistence write failed; in-memory state was kept
    StorageFailed(String),
    /// The persisted queue was unreadable at startup and was reset
    LoadRecovered(String),
}
