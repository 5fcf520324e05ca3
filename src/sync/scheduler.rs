//! Periodic sync trigger.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::queue::SyncQueue;

/// Default interval between scheduled passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Calls `attempt_sync` on a fixed interval.
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    interval: Duration,
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_INTERVAL)
    }
}

impl SyncScheduler {
    /// Scheduler ticking every `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Configured interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until `cancel` fires. The first pass happens one interval after
    /// start; a pass in flight when `cancel` fires stops before its next
    /// remote call.
    pub fn spawn(&self, queue: SyncQueue, cancel: CancellationToken) -> JoinHandle<()> {
        let interval = self.interval;
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "sync scheduler started");
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = queue.attempt_sync_with_cancel(&cancel).await;
                        debug!(ran = report.ran(), applied = report.applied.len(), "scheduled pass finished");
                    }
                }
            }
            info!("sync scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sync::remote::MockRemoteApply;
    use crate::sync::{ChangeType, MemoryStore, PendingChange, SyncStatus};

    #[test]
    fn test_default_interval() {
        assert_eq!(SyncScheduler::default().interval(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_passes() {
        let mut remote = MockRemoteApply::new();
        remote.expect_apply().times(1).returning(|_, _| Ok(()));
        let queue = SyncQueue::new(Arc::new(MemoryStore::new()), Arc::new(remote));

        if let Some(edge) = queue.set_connectivity(true) {
            assert!(!edge.await.unwrap().ran());
        }
        queue
            .enqueue(PendingChange::with_id("a", ChangeType::MilestoneCreate, Vec::new()))
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = SyncScheduler::new(Duration::from_secs(60)).spawn(queue.clone(), cancel.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.status(), SyncStatus::Succeeded);

        cancel.cancel();
        handle.await.unwrap();
    }
}
