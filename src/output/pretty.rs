use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::sync::{DeadLetter, PendingChange, QueueSnapshot, SkipReason, SyncReport, SyncStatus};

const PAYLOAD_PREVIEW: usize = 48;

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn payload_preview(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim();
    if text.chars().count() > PAYLOAD_PREVIEW {
        let cut: String = text.chars().take(PAYLOAD_PREVIEW).collect();
        format!("{cut}…")
    } else {
        text.to_string()
    }
}

fn status_label(status: &SyncStatus) -> String {
    match status {
        SyncStatus::Idle => "idle".dimmed().to_string(),
        SyncStatus::Syncing => "syncing".cyan().to_string(),
        SyncStatus::Succeeded => "succeeded".green().to_string(),
        SyncStatus::Failed(reason) => format!("{} {}", "failed".red(), reason.dimmed()),
    }
}

/// Format the queue status.
pub fn format_status_pretty(snapshot: &QueueSnapshot) -> String {
    let mut lines = Vec::new();

    lines.push("Sync Queue Status".bold().to_string());
    lines.push("─".repeat(40));

    lines.push(format!(
        "  Pending:       {} {}",
        snapshot.pending,
        if snapshot.pending > 0 {
            "changes waiting".dimmed()
        } else {
            "".dimmed()
        }
    ));
    lines.push(format!(
        "  Dead letters:  {}",
        if snapshot.dead_letters > 0 {
            snapshot.dead_letters.to_string().red().to_string()
        } else {
            "0".to_string()
        }
    ));
    lines.push(format!("  Status:        {}", status_label(&snapshot.status)));
    lines.push(format!(
        "  Last sync:     {}",
        snapshot
            .last_sync_at
            .map_or_else(|| "never".dimmed().to_string(), format_time)
    ));

    if let Some(oldest) = snapshot.oldest_pending {
        lines.push(format!("  Oldest:        {}", format_time(oldest)));
    }

    lines.join("\n")
}

/// Format pending changes in queue order.
pub fn format_pending_pretty(changes: &[PendingChange], limit: usize) -> String {
    if changes.is_empty() {
        return "Pending changes (0)\n  Queue is empty".to_string();
    }

    let mut output = format!("Pending changes ({})\n", changes.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for change in changes.iter().take(limit) {
        let mut line = format!(
            "{} {}  {}",
            change.id.as_str().dimmed(),
            change.change_type.as_str().bold(),
            payload_preview(&change.payload)
        );
        if change.retry_count > 0 {
            line.push_str(&format!("  {}", format!("retries: {}", change.retry_count).yellow()));
        }
        output.push_str(&line);
        output.push('\n');

        if let Some(error) = &change.last_error {
            output.push_str(&format!("    {} {}\n", "last error:".dimmed(), error.red()));
        }
    }

    if changes.len() > limit {
        output.push_str(&format!("  … and {} more\n", changes.len() - limit).dimmed().to_string());
    }

    output
}

/// Format a freshly queued change.
pub fn format_enqueued_pretty(change: &PendingChange, pending: usize) -> String {
    format!(
        "{} {} {} ({} pending)",
        "Queued".green(),
        change.change_type.display_name(),
        change.id.as_str().dimmed(),
        pending
    )
}

/// Format the outcome of a sync pass.
pub fn format_report_pretty(report: &SyncReport, remaining: usize) -> String {
    if let Some(reason) = &report.skipped {
        let why = match reason {
            SkipReason::Offline => "offline".to_string(),
            SkipReason::Empty => "queue is empty".to_string(),
            SkipReason::AlreadySyncing => "another sync is running".to_string(),
            SkipReason::BackingOff(until) => format!("backing off until {}", format_time(*until)),
        };
        return format!("{} {}", "Sync skipped:".yellow(), why);
    }

    let mut lines = Vec::new();
    lines.push("Sync Results".bold().to_string());
    lines.push("─".repeat(40));
    lines.push(format!(
        "  {} {} applied",
        "✓".green(),
        report.applied.len()
    ));

    if !report.dead_lettered.is_empty() {
        lines.push(format!(
            "  {} {} dead-lettered",
            "✗".red(),
            report.dead_lettered.len()
        ));
        for id in &report.dead_lettered {
            lines.push(format!("    {}", id.as_str().dimmed()));
        }
    }

    if let Some(blocked) = &report.blocked {
        lines.push(format!(
            "  {} {} blocked after {} attempt(s): {}",
            "!".yellow(),
            blocked.id.as_str().bold(),
            blocked.retry_count,
            blocked.error.red()
        ));
    }

    if report.cancelled {
        lines.push(format!("  {} cancelled", "!".yellow()));
    }

    lines.push(format!("  {remaining} remaining"));
    lines.join("\n")
}

/// Format dead letters, newest first.
pub fn format_dead_letters_pretty(letters: &[DeadLetter], limit: usize) -> String {
    if letters.is_empty() {
        return "Dead letters (0)\n  None".to_string();
    }

    let mut output = format!("Dead letters ({})\n", letters.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for letter in letters.iter().rev().take(limit) {
        output.push_str(&format!(
            "{} {}  {}\n",
            letter.change.id.as_str().dimmed(),
            letter.change.change_type.as_str().bold(),
            format_time(letter.dead_lettered_at)
        ));
        output.push_str(&format!("    {}\n", letter.reason.red()));
    }

    output
}
