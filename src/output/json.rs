//! JSON output formatting for cradlesync.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::error::Error;
use crate::sync::{DeadLetter, PendingChange, QueueSnapshot, SyncReport};

/// Serialize any value as pretty JSON.
///
/// # Errors
///
/// Returns `Error::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// A pending change with its payload decoded for display.
#[derive(Debug, Serialize)]
pub struct ChangeView<'a> {
    pub id: &'a str,
    pub change_type: &'a str,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<&'a str>,
}

impl<'a> ChangeView<'a> {
    /// Build a view; payloads that are not JSON are shown as text.
    #[must_use]
    pub fn new(change: &'a PendingChange) -> Self {
        let payload = serde_json::from_slice(&change.payload).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&change.payload).into_owned())
        });
        Self {
            id: change.id.as_str(),
            change_type: change.change_type.as_str(),
            payload,
            created_at: change.created_at,
            retry_count: change.retry_count,
            last_attempt_at: change.last_attempt_at,
            last_error: change.last_error.as_deref(),
        }
    }
}

/// Format the queue status as JSON.
///
/// # Errors
///
/// Returns `Error::Parse` if JSON serialization fails.
pub fn format_status_json(snapshot: &QueueSnapshot) -> Result<String, Error> {
    to_json(snapshot)
}

/// Format pending changes as JSON.
///
/// # Errors
///
/// Returns `Error::Parse` if JSON serialization fails.
pub fn format_pending_json(changes: &[PendingChange], limit: usize) -> Result<String, Error> {
    let items: Vec<ChangeView<'_>> = changes.iter().take(limit).map(ChangeView::new).collect();
    to_json(&json!({
        "count": changes.len(),
        "items": items,
    }))
}

/// Format a single change as JSON.
///
/// # Errors
///
/// Returns `Error::Parse` if JSON serialization fails.
pub fn format_change_json(change: &PendingChange) -> Result<String, Error> {
    to_json(&ChangeView::new(change))
}

/// Format a sync report as JSON, including the resulting status.
///
/// # Errors
///
/// Returns `Error::Parse` if JSON serialization fails.
pub fn format_report_json(report: &SyncReport, remaining: usize) -> Result<String, Error> {
    to_json(&json!({
        "report": report,
        "status": report.final_status(),
        "remaining": remaining,
    }))
}

/// Format dead letters as JSON.
///
/// # Errors
///
/// Returns `Error::Parse` if JSON serialization fails.
pub fn format_dead_letters_json(letters: &[DeadLetter], limit: usize) -> Result<String, Error> {
    let items: Vec<_> = letters
        .iter()
        .rev()
        .take(limit)
        .map(|letter| {
            json!({
                "change": ChangeView::new(&letter.change),
                "reason": letter.reason,
                "dead_lettered_at": letter.dead_lettered_at,
            })
        })
        .collect();
    to_json(&json!({
        "count": letters.len(),
        "items": items,
    }))
}
