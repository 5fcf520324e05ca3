//! Output formatting for cradlesync.
//!
//! Every command renders through one of these functions so that `--output`
//! switches between colored text and JSON uniformly.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::error::Error;
use crate::sync::{DeadLetter, PendingChange, QueueSnapshot, SyncReport};

pub use json::*;
pub use pretty::*;

/// Format the queue status based on output format
///
/// # Errors
///
/// Returns `Error::Parse` if JSON serialization fails.
pub fn format_status(snapshot: &QueueSnapshot, format: OutputFormat) -> Result<String, Error> {
    match format {
        OutputFormat::Pretty => Ok(format_status_pretty(snapshot)),
        OutputFormat::Json => format_status_json(snapshot),
    }
}

/// Format pending changes based on output format
///
/// # Errors
///
/// Returns `Error::Parse` if JSON serialization fails.
pub fn format_pending(
    changes: &[PendingChange],
    limit: usize,
    format: OutputFormat,
) -> Result<String, Error> {
    match format {
        OutputFormat::Pretty => Ok(format_pending_pretty(changes, limit)),
        OutputFormat::Json => format_pending_json(changes, limit),
    }
}

/// Format a newly queued change based on output format
///
/// # Errors
///
/// Returns `Error::Parse` if JSON serialization fails.
pub fn format_enqueued(
    change: &PendingChange,
    pending: usize,
    format: OutputFormat,
) -> Result<String, Error> {
    match format {
        OutputFormat::Pretty => Ok(format_enqueued_pretty(change, pending)),
        OutputFormat::Json => format_change_json(change),
    }
}

/// Format a sync report based on output format
///
/// # Errors
///
/// Returns `Error::Parse` if JSON serialization fails.
pub fn format_report(
    report: &SyncReport,
    remaining: usize,
    format: OutputFormat,
) -> Result<String, Error> {
    match format {
        OutputFormat::Pretty => Ok(format_report_pretty(report, remaining)),
        OutputFormat::Json => format_report_json(report, remaining),
    }
}

/// Format dead letters based on output format
///
/// # Errors
///
/// Returns `Error::Parse` if JSON serialization fails.
pub fn format_dead_letters(
    letters: &[DeadLetter],
    limit: usize,
    format: OutputFormat,
) -> Result<String, Error> {
    match format {
        OutputFormat::Pretty => Ok(format_dead_letters_pretty(letters, limit)),
        OutputFormat::Json => format_dead_letters_json(letters, limit),
    }
}
