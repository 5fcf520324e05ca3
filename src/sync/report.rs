//! Outcome of a single sync pass.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::change::ChangeId;
use super::status::SyncStatus;

/// Why a requested pass did not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "until", rename_all = "snake_case")]
pub enum SkipReason {
    /// Connectivity is down
    Offline,
    /// Nothing is queued
    Empty,
    /// Another pass is in flight
    AlreadySyncing,
    /// The head change is waiting out its backoff
    BackingOff(DateTime<Utc>),
}

/// The change that stopped a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedChange {
    /// Change id
    pub id: ChangeId,
    /// Failures so far, including this one
    pub retry_count: u32,
    /// Error returned by the backend
    pub error: String,
}

/// Result of one call to `attempt_sync`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Set when the pass never started
    pub skipped: Option<SkipReason>,
    /// Changes applied and removed, in order
    pub applied: Vec<ChangeId>,
    /// Changes dropped after exhausting their retries
    pub dead_lettered: Vec<ChangeId>,
    /// Change whose failure stopped the pass
    pub blocked: Option<BlockedChange>,
    /// Whether the pass was cancelled before draining
    pub cancelled: bool,
}

impl SyncReport {
    /// Report for a pass that did not run.
    #[must_use]
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    /// Whether the pass ran at all.
    #[must_use]
    pub const fn ran(&self) -> bool {
        self.skipped.is_none()
    }

    /// Whether every change in the snapshot was applied.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.ran() && self.blocked.is_none() && self.dead_lettered.is_empty() && !self.cancelled
    }

    /// Total changes resolved by this pass.
    #[must_use]
    pub fn total(&self) -> usize {
        self.applied.len() + self.dead_lettered.len()
    }

    /// Status the queue ends in after this pass.
    ///
    /// Returns `None` for a skipped pass, which leaves the status untouched.
    #[must_use]
    pub fn final_status(&self) -> Option<SyncStatus> {
        if !self.ran() {
            return None;
        }
        if self.cancelled {
            return Some(SyncStatus::Failed("sync cancelled".to_string()));
        }
        if let Some(blocked) = &self.blocked {
            return Some(SyncStatus::Failed(format!(
                "change {} failed (attempt {}): {}",
                blocked.id, blocked.retry_count, blocked.error
            )));
        }
        if !self.dead_lettered.is_empty() {
            let ids: Vec<&str> = self.dead_lettered.iter().map(ChangeId::as_str).collect();
            return Some(SyncStatus::Failed(format!(
                "dead-lettered after exhausting retries: {}",
                ids.join(", ")
            )));
        }
        Some(SyncStatus::Succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_report() {
        let report = SyncReport::skipped(SkipReason::Offline);
        assert!(!report.ran());
        assert!(!report.all_succeeded());
        assert_eq!(report.final_status(), None);
    }

    #[test]
    fn test_drained_report_succeeds() {
        let report = SyncReport {
            applied: vec![ChangeId::from("a"), ChangeId::from("b")],
            ..SyncReport::default()
        };
        assert!(report.all_succeeded());
        assert_eq!(report.total(), 2);
        assert_eq!(report.final_status(), Some(SyncStatus::Succeeded));
    }

    #[test]
    fn test_blocked_report_fails() {
        let report = SyncReport {
            applied: vec![ChangeId::from("a")],
            blocked: Some(BlockedChange {
                id: ChangeId::from("b"),
                retry_count: 1,
                error: "timeout".to_string(),
            }),
            ..SyncReport::default()
        };
        assert_eq!(
            report.final_status(),
            Some(SyncStatus::Failed(
                "change b failed (attempt 1): timeout".to_string()
            ))
        );
    }

    #[test]
    fn test_dead_letter_report_fails() {
        let report = SyncReport {
            dead_lettered: vec![ChangeId::from("x")],
            applied: vec![ChangeId::from("y")],
            ..SyncReport::default()
        };
        assert!(!report.all_succeeded());
        assert!(report
            .final_status()
            .unwrap()
            .failure_reason()
            .unwrap()
            .contains('x'));
    }

    #[test]
    fn test_cancelled_report() {
        let report = SyncReport {
            cancelled: true,
            ..SyncReport::default()
        };
        assert_eq!(
            report.final_status(),
            Some(SyncStatus::Failed("sync cancelled".to_string()))
        );
    }
}
