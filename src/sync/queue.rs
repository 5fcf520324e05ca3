//! The offline change queue and its sync engine.
//!
//! [`SyncQueue`] buffers changes that could not be applied remotely and
//! replays them in FIFO order once connectivity returns. All state lives behind
//! a single mutex that is never held across the remote call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::change::{ChangeId, PendingChange};
use super::policy::RetryPolicy;
use super::remote::{ApplyError, RemoteApply};
use super::report::{BlockedChange, SkipReason, SyncReport};
use super::status::{DeadLetter, SyncEvent, SyncStatus};
use super::store::{ChangeStore, StoreError};

const EVENT_CAPACITY: usize = 64;
const INTERRUPTED: &str = "sync interrupted";

/// Callback invoked on every status transition.
pub type StatusCallback = Arc<dyn Fn(&SyncStatus) + Send + Sync>;

/// Error returned by queue mutations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The id is already queued; nothing changed.
    #[error("change {0} is already queued")]
    Duplicate(ChangeId),

    /// The in-memory mutation stands but could not be persisted.
    #[error("queue updated in memory but not persisted: {0}")]
    Storage(#[from] StoreError),
}

/// Point-in-time view of the queue for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub pending: usize,
    pub online: bool,
    pub status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub oldest_pending: Option<DateTime<Utc>>,
    pub dead_letters: usize,
}

struct QueueState {
    pending: Vec<PendingChange>,
    online: bool,
    status: SyncStatus,
    last_sync_at: Option<DateTime<Utc>>,
    dead_letters: Vec<DeadLetter>,
    load_error: Option<String>,
    load_error_unreported: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    store: Arc<dyn ChangeStore>,
    remote: Arc<dyn RemoteApply>,
    policy: RetryPolicy,
    events: broadcast::Sender<SyncEvent>,
    observers: RwLock<Vec<StatusCallback>>,
    background: TaskTracker,
    shutdown: CancellationToken,
}

enum FailureOutcome {
    Retry(u32),
    DeadLettered,
    Gone,
}

/// Offline change queue. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct SyncQueue {
    shared: Arc<Shared>,
}

impl SyncQueue {
    /// Open a queue with the default retry policy.
    ///
    /// Starts offline; see [`SyncQueue::with_policy`].
    #[must_use]
    pub fn new(store: Arc<dyn ChangeStore>, remote: Arc<dyn RemoteApply>) -> Self {
        Self::with_policy(store, remote, RetryPolicy::default())
    }

    /// Open a queue, loading pending changes from `store`.
    ///
    /// An unreadable store does not fail construction: the queue starts empty
    /// and the problem is available from [`SyncQueue::load_error`].
    #[must_use]
    pub fn with_policy(
        store: Arc<dyn ChangeStore>,
        remote: Arc<dyn RemoteApply>,
        policy: RetryPolicy,
    ) -> Self {
        let (pending, load_error) = match store.load() {
            Ok(changes) => (dedup_by_id(changes), None),
            Err(e) => {
                warn!(error = %e, "discarding unreadable sync queue");
                (Vec::new(), Some(e.to_string()))
            },
        };

        let dead_letters = store.load_dead_letters().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load dead letters");
            Vec::new()
        });
        let last_sync_at = store.load_last_sync().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load last sync time");
            None
        });

        info!(pending = pending.len(), "sync queue opened");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    pending,
                    online: false,
                    status: SyncStatus::Idle,
                    last_sync_at,
                    dead_letters,
                    load_error_unreported: load_error.is_some(),
                    load_error,
                }),
                store,
                remote,
                policy,
                events,
                observers: RwLock::new(Vec::new()),
                background: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// The retry policy in effect.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.shared.policy
    }

    /// Why the persisted queue was discarded at startup, if it was.
    #[must_use]
    pub fn load_error(&self) -> Option<String> {
        self.shared.state.lock().load_error.clone()
    }

    /// Subscribe to queue events.
    ///
    /// A load failure from construction is delivered once, to the first
    /// subscriber; later subscribers can read [`SyncQueue::load_error`].
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        let mut state = self.shared.state.lock();
        let rx = self.shared.events.subscribe();
        if std::mem::take(&mut state.load_error_unreported) {
            if let Some(reason) = state.load_error.clone() {
                let _ = self.shared.events.send(SyncEvent::LoadRecovered(reason));
            }
        }
        rx
    }

    /// Register a callback for status transitions.
    ///
    /// Callbacks run on the thread that changed the status, with no queue
    /// lock held. A callback registered from inside another callback is first
    /// invoked on the next transition.
    pub fn on_status_change<F>(&self, callback: F)
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.shared.observers.write().push(Arc::new(callback));
    }

    /// Add a change to the back of the queue and persist it.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Duplicate` if the id is already queued (nothing
    /// changes), or `QueueError::Storage` if persisting failed (the change is
    /// still queued in memory).
    pub fn enqueue(&self, change: PendingChange) -> Result<(), QueueError> {
        let (reset, saved) = {
            let mut state = self.shared.state.lock();
            if state.pending.iter().any(|c| c.id == change.id) {
                return Err(QueueError::Duplicate(change.id));
            }

            debug!(id = %change.id, change_type = %change.change_type, "enqueue");
            state.pending.push(change);

            let reset = state.status.is_terminal();
            if reset {
                state.status = SyncStatus::Idle;
            }
            (reset, self.persist(&state))
        };

        if reset {
            self.notify_status(&SyncStatus::Idle);
        }
        saved.map_err(QueueError::from)
    }

    /// Remove a change by id. Absent ids are ignored.
    ///
    /// Returns whether a change was removed.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Storage` if persisting failed.
    pub fn dequeue(&self, id: &ChangeId) -> Result<bool, QueueError> {
        let mut state = self.shared.state.lock();
        let before = state.pending.len();
        state.pending.retain(|c| &c.id != id);
        let removed = state.pending.len() != before;
        if removed {
            debug!(%id, "dequeue");
        }
        self.persist(&state)?;
        Ok(removed)
    }

    /// Drop every pending change.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Storage` if persisting failed.
    pub fn clear(&self) -> Result<usize, QueueError> {
        let mut state = self.shared.state.lock();
        let count = state.pending.len();
        state.pending.clear();
        info!(count, "sync queue cleared");
        self.persist(&state)?;
        Ok(count)
    }

    /// Re-save the current queue, e.g. at shutdown.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Storage` if persisting failed.
    pub fn flush(&self) -> Result<(), QueueError> {
        let state = self.shared.state.lock();
        self.persist(&state)?;
        Ok(())
    }

    /// Update connectivity.
    ///
    /// An offline to online edge spawns a sync pass on the current Tokio
    /// runtime and returns its handle. Any other call returns `None`.
    pub fn set_connectivity(&self, online: bool) -> Option<JoinHandle<SyncReport>> {
        let was_online = std::mem::replace(&mut self.shared.state.lock().online, online);
        if was_online == online {
            return None;
        }

        info!(online, "connectivity changed");
        online.then(|| self.spawn_sync())
    }

    /// Run a pass in the background.
    ///
    /// The pass is tracked by the queue and stops before its next remote call
    /// once [`SyncQueue::shutdown`] is called.
    #[must_use]
    pub fn spawn_sync(&self) -> JoinHandle<SyncReport> {
        let queue = self.clone();
        let cancel = self.shared.shutdown.clone();
        self.shared
            .background
            .spawn(async move { queue.attempt_sync_with_cancel(&cancel).await })
    }

    /// Stop background passes, wait for them, and flush the queue.
    ///
    /// A pass blocked in a remote call finishes that call first. Passes
    /// spawned afterwards are cancelled before their first remote call.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Storage` if the final flush failed.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.shared.shutdown.cancel();
        self.shared.background.close();
        self.shared.background.wait().await;
        info!(pending = self.pending_count(), "sync queue shut down");
        self.flush()
    }

    /// Run one sync pass.
    pub async fn attempt_sync(&self) -> SyncReport {
        self.attempt_sync_with_cancel(&CancellationToken::new()).await
    }

    /// Run one sync pass, stopping before the next remote call once `cancel`
    /// fires. Changes already applied stay removed.
    pub async fn attempt_sync_with_cancel(&self, cancel: &CancellationToken) -> SyncReport {
        let snapshot = {
            let mut state = self.shared.state.lock();
            if let Some(reason) = self.skip_reason(&state, Utc::now()) {
                debug!(?reason, "sync pass skipped");
                return SyncReport::skipped(reason);
            }
            state.status = SyncStatus::Syncing;
            state.pending.clone()
        };
        let guard = PassGuard {
            queue: self,
            finished: false,
        };
        self.notify_status(&SyncStatus::Syncing);
        info!(changes = snapshot.len(), "sync pass started");

        let mut report = SyncReport::default();
        for change in snapshot {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if !self.contains(&change.id) {
                continue;
            }

            match self
                .shared
                .remote
                .apply(change.change_type, &change.payload)
                .await
            {
                Ok(()) => {
                    debug!(id = %change.id, "change applied");
                    self.remove_applied(&change.id);
                    report.applied.push(change.id);
                },
                Err(e) => match self.record_failure(&change.id, &e) {
                    FailureOutcome::Retry(retry_count) => {
                        report.blocked = Some(BlockedChange {
                            id: change.id,
                            retry_count,
                            error: e.to_string(),
                        });
                        break;
                    },
                    FailureOutcome::DeadLettered => report.dead_lettered.push(change.id),
                    FailureOutcome::Gone => {},
                },
            }
        }

        guard.finish(&report);
        report
    }

    /// Number of pending changes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Copy of the pending changes in order.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingChange> {
        self.shared.state.lock().pending.clone()
    }

    /// Look up a pending change.
    #[must_use]
    pub fn get(&self, id: &ChangeId) -> Option<PendingChange> {
        self.shared
            .state
            .lock()
            .pending
            .iter()
            .find(|c| &c.id == id)
            .cloned()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.shared.state.lock().status.clone()
    }

    /// Whether the queue believes it is online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.shared.state.lock().online
    }

    /// When the last fully successful pass finished.
    #[must_use]
    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.shared.state.lock().last_sync_at
    }

    /// Changes abandoned after exhausting their retries, oldest first.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.shared.state.lock().dead_letters.clone()
    }

    /// Summary for display.
    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.shared.state.lock();
        QueueSnapshot {
            pending: state.pending.len(),
            online: state.online,
            status: state.status.clone(),
            last_sync_at: state.last_sync_at,
            oldest_pending: state.pending.first().map(|c| c.created_at),
            dead_letters: state.dead_letters.len(),
        }
    }

    fn skip_reason(&self, state: &QueueState, now: DateTime<Utc>) -> Option<SkipReason> {
        if !state.online {
            return Some(SkipReason::Offline);
        }
        if state.status.is_syncing() {
            return Some(SkipReason::AlreadySyncing);
        }
        let Some(head) = state.pending.first() else {
            return Some(SkipReason::Empty);
        };
        if self.shared.policy.is_ready(head, now) {
            return None;
        }
        self.shared
            .policy
            .next_attempt_at(head)
            .map(SkipReason::BackingOff)
    }

    fn contains(&self, id: &ChangeId) -> bool {
        self.shared.state.lock().pending.iter().any(|c| &c.id == id)
    }

    fn remove_applied(&self, id: &ChangeId) {
        let mut state = self.shared.state.lock();
        let before = state.pending.len();
        state.pending.retain(|c| &c.id != id);
        if state.pending.len() != before {
            let _ = self.persist(&state);
        }
    }

    fn record_failure(&self, id: &ChangeId, error: &ApplyError) -> FailureOutcome {
        let now = Utc::now();
        let mut state = self.shared.state.lock();
        let Some(index) = state.pending.iter().position(|c| &c.id == id) else {
            return FailureOutcome::Gone;
        };

        let change = &mut state.pending[index];
        change.record_failure(&error.to_string(), now);
        let retry_count = change.retry_count;

        if !self.shared.policy.is_exhausted(retry_count) {
            warn!(%id, retry_count, %error, "change failed, will retry");
            let _ = self.persist(&state);
            return FailureOutcome::Retry(retry_count);
        }

        let change = state.pending.remove(index);
        warn!(%id, retry_count, %error, "change dead-lettered");
        let _ = self.persist(&state);

        let letter = DeadLetter {
            change,
            reason: error.to_string(),
            dead_lettered_at: now,
        };
        if let Err(e) = self.shared.store.record_dead_letter(&letter) {
            self.report_storage_failure(&e);
        }
        state.dead_letters.push(letter.clone());
        drop(state);

        let _ = self.shared.events.send(SyncEvent::DeadLettered(letter));
        FailureOutcome::DeadLettered
    }

    fn finish_pass(&self, report: &SyncReport) {
        let Some(status) = report.final_status() else {
            return;
        };

        {
            let mut state = self.shared.state.lock();
            state.status = status.clone();
            if status == SyncStatus::Succeeded {
                let now = Utc::now();
                state.last_sync_at = Some(now);
                if let Err(e) = self.shared.store.save_last_sync(now) {
                    self.report_storage_failure(&e);
                }
            }
        }

        match &status {
            SyncStatus::Failed(reason) => warn!(
                applied = report.applied.len(),
                dead_lettered = report.dead_lettered.len(),
                %reason,
                "sync pass failed"
            ),
            _ => info!(applied = report.applied.len(), "sync pass succeeded"),
        }
        self.notify_status(&status);
    }

    fn persist(&self, state: &QueueState) -> Result<(), StoreError> {
        self.shared.store.save(&state.pending).map_err(|e| {
            self.report_storage_failure(&e);
            e
        })
    }

    fn report_storage_failure(&self, error: &StoreError) {
        warn!(%error, "failed to persist sync queue");
        let _ = self
            .shared
            .events
            .send(SyncEvent::StorageFailed(error.to_string()));
    }

    fn notify_status(&self, status: &SyncStatus) {
        let callbacks = self.shared.observers.read().clone();
        for callback in &callbacks {
            callback(status);
        }
        let _ = self
            .shared
            .events
            .send(SyncEvent::StatusChanged(status.clone()));
    }
}

/// Leaves `Syncing` if a pass future is dropped before it finishes, e.g. by
/// `JoinHandle::abort`, a timeout, or a panicking remote. The change that was
/// in flight keeps its place and retry count.
struct PassGuard<'a> {
    queue: &'a SyncQueue,
    finished: bool,
}

impl PassGuard<'_> {
    fn finish(mut self, report: &SyncReport) {
        self.finished = true;
        self.queue.finish_pass(report);
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let status = SyncStatus::Failed(INTERRUPTED.to_string());
        {
            let mut state = self.queue.shared.state.lock();
            if !state.status.is_syncing() {
                return;
            }
            state.status = status.clone();
        }
        warn!("sync pass dropped before finishing");
        self.queue.notify_status(&status);
    }
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue")
            .field("snapshot", &self.snapshot())
            .field("policy", &self.shared.policy)
            .finish_non_exhaustive()
    }
}

fn dedup_by_id(changes: Vec<PendingChange>) -> Vec<PendingChange> {
    let mut seen = std::collections::HashSet::new();
    let total = changes.len();
    let unique: Vec<_> = changes
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect();
    if unique.len() != total {
        warn!(dropped = total - unique.len(), "dropped duplicate ids from stored queue");
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::remote::MockRemoteApply;
    use crate::sync::store::MemoryStore;
    use crate::sync::{Backoff, ChangeType};

    fn change(id: &str) -> PendingChange {
        PendingChange::with_id(id, ChangeType::TrackingRecord, id.as_bytes().to_vec())
    }

    fn queue_with(remote: MockRemoteApply) -> (SyncQueue, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let queue = SyncQueue::new(store.clone(), Arc::new(remote));
        (queue, store)
    }

    #[test]
    fn test_enqueue_persists() {
        let (queue, store) = queue_with(MockRemoteApply::new());

        queue.enqueue(change("a")).unwrap();
        queue.enqueue(change("b")).unwrap();

        assert_eq!(queue.pending_count(), 2);
        let ids: Vec<_> = store.persisted().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![ChangeId::from("a"), ChangeId::from("b")]);
    }

    #[test]
    fn test_duplicate_enqueue_rejected() {
        let (queue, store) = queue_with(MockRemoteApply::new());
        queue.enqueue(change("a")).unwrap();

        let err = queue.enqueue(change("a")).unwrap_err();
        assert!(matches!(err, QueueError::Duplicate(id) if id.as_str() == "a"));
        assert_eq!(queue.pending_count(), 1);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_storage_failure_keeps_change_in_memory() {
        let (queue, store) = queue_with(MockRemoteApply::new());
        let mut events = queue.subscribe();
        store.set_fail_saves(true);

        let err = queue.enqueue(change("a")).unwrap_err();
        assert!(matches!(err, QueueError::Storage(_)));
        assert_eq!(queue.pending_count(), 1);
        assert!(matches!(events.try_recv(), Ok(SyncEvent::StorageFailed(_))));

        // Next successful save reconciles
        store.set_fail_saves(false);
        queue.enqueue(change("b")).unwrap();
        assert_eq!(store.persisted().len(), 2);
    }

    #[test]
    fn test_dequeue_and_clear() {
        let (queue, store) = queue_with(MockRemoteApply::new());
        queue.enqueue(change("a")).unwrap();
        queue.enqueue(change("b")).unwrap();
        queue.enqueue(change("c")).unwrap();

        assert!(queue.dequeue(&ChangeId::from("b")).unwrap());
        assert!(!queue.dequeue(&ChangeId::from("missing")).unwrap());
        assert_eq!(store.persisted().len(), 2);

        assert_eq!(queue.clear().unwrap(), 2);
        assert!(store.persisted().is_empty());
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_load_drops_duplicate_ids() {
        let store = Arc::new(MemoryStore::with_changes(vec![
            change("a"),
            change("b"),
            change("a"),
        ]));
        let queue = SyncQueue::new(store, Arc::new(MockRemoteApply::new()));
        assert_eq!(queue.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_offline_pass_is_noop() {
        let mut remote = MockRemoteApply::new();
        remote.expect_apply().never();
        let (queue, _) = queue_with(remote);
        queue.enqueue(change("a")).unwrap();

        let report = queue.attempt_sync().await;
        assert_eq!(report.skipped, Some(SkipReason::Offline));
        assert_eq!(queue.status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_empty_pass_is_noop() {
        let (queue, _) = queue_with(MockRemoteApply::new());
        let _ = queue.set_connectivity(true);

        let report = queue.attempt_sync().await;
        assert_eq!(report.skipped, Some(SkipReason::Empty));
    }

    #[tokio::test]
    async fn test_successful_pass() {
        let mut remote = MockRemoteApply::new();
        remote.expect_apply().times(2).returning(|_, _| Ok(()));
        let (queue, store) = queue_with(remote);
        queue.enqueue(change("a")).unwrap();
        queue.enqueue(change("b")).unwrap();
        queue.shared.state.lock().online = true;

        let report = queue.attempt_sync().await;

        assert_eq!(report.applied.len(), 2);
        assert_eq!(queue.status(), SyncStatus::Succeeded);
        assert!(queue.last_sync_at().is_some());
        assert!(store.persisted().is_empty());
        assert_eq!(store.load_last_sync().unwrap(), queue.last_sync_at());
    }

    #[tokio::test]
    async fn test_failure_stops_pass() {
        let mut remote = MockRemoteApply::new();
        remote
            .expect_apply()
            .times(1)
            .returning(|_, _| Err(ApplyError::Network("down".to_string())));
        let (queue, store) = queue_with(remote);
        queue.enqueue(change("a")).unwrap();
        queue.enqueue(change("b")).unwrap();
        queue.shared.state.lock().online = true;

        let report = queue.attempt_sync().await;

        let blocked = report.blocked.unwrap();
        assert_eq!(blocked.id.as_str(), "a");
        assert_eq!(blocked.retry_count, 1);
        assert!(queue.status().failure_reason().is_some());
        assert_eq!(store.persisted()[0].retry_count, 1);
        assert_eq!(queue.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_enqueue_resets_terminal_status() {
        let mut remote = MockRemoteApply::new();
        remote.expect_apply().returning(|_, _| Ok(()));
        let (queue, _) = queue_with(remote);
        queue.enqueue(change("a")).unwrap();
        queue.shared.state.lock().online = true;
        queue.attempt_sync().await;
        assert_eq!(queue.status(), SyncStatus::Succeeded);

        queue.enqueue(change("b")).unwrap();
        assert_eq!(queue.status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_status_callbacks() {
        let mut remote = MockRemoteApply::new();
        remote.expect_apply().returning(|_, _| Ok(()));
        let (queue, _) = queue_with(remote);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        queue.on_status_change(move |status| sink.lock().push(status.clone()));

        queue.enqueue(change("a")).unwrap();
        queue.shared.state.lock().online = true;
        queue.attempt_sync().await;

        assert_eq!(
            *seen.lock(),
            vec![SyncStatus::Syncing, SyncStatus::Succeeded]
        );
    }

    #[tokio::test]
    async fn test_backoff_defers_pass() {
        let mut remote = MockRemoteApply::new();
        remote
            .expect_apply()
            .times(1)
            .returning(|_, _| Err(ApplyError::Network("down".to_string())));
        let store = Arc::new(MemoryStore::new());
        let policy = RetryPolicy {
            max_retries: 5,
            backoff: Some(Backoff::default()),
        };
        let queue = SyncQueue::with_policy(store, Arc::new(remote), policy);
        queue.enqueue(change("a")).unwrap();
        queue.shared.state.lock().online = true;

        queue.attempt_sync().await;
        let report = queue.attempt_sync().await;

        assert!(matches!(report.skipped, Some(SkipReason::BackingOff(_))));
        assert_eq!(queue.get(&ChangeId::from("a")).unwrap().retry_count, 1);
    }

    #[tokio::test]
    async fn test_cancelled_pass() {
        let mut remote = MockRemoteApply::new();
        remote.expect_apply().never();
        let (queue, _) = queue_with(remote);
        queue.enqueue(change("a")).unwrap();
        queue.shared.state.lock().online = true;

        let token = CancellationToken::new();
        token.cancel();
        let report = queue.attempt_sync_with_cancel(&token).await;

        assert!(report.cancelled);
        assert_eq!(
            queue.status(),
            SyncStatus::Failed("sync cancelled".to_string())
        );
        assert_eq!(queue.pending_count(), 1);
    }

    struct UnreadableStore;

    impl ChangeStore for UnreadableStore {
        fn load(&self) -> Result<Vec<PendingChange>, StoreError> {
            Err(StoreError::Corrupt("bad header".to_string()))
        }

        fn save(&self, _changes: &[PendingChange]) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_load_error_reported_once() {
        let queue = SyncQueue::new(Arc::new(UnreadableStore), Arc::new(MockRemoteApply::new()));
        assert_eq!(queue.pending_count(), 0);

        let mut first = queue.subscribe();
        let mut second = queue.subscribe();

        assert!(matches!(first.try_recv(), Ok(SyncEvent::LoadRecovered(_))));
        assert!(first.try_recv().is_err());
        assert!(second.try_recv().is_err());
        assert!(queue.load_error().is_some());
    }

    #[test]
    fn test_callback_may_register_another() {
        let (queue, _) = queue_with(MockRemoteApply::new());
        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let inner = queue.clone();
        let counter = hits.clone();
        queue.on_status_change(move |_| {
            let counter = counter.clone();
            inner.on_status_change(move |_| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            });
        });

        queue.shared.state.lock().status = SyncStatus::Succeeded;
        queue.enqueue(change("a")).unwrap();
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 0);

        queue.shared.state.lock().status = SyncStatus::Failed("x".to_string());
        queue.enqueue(change("b")).unwrap();
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot() {
        let (queue, _) = queue_with(MockRemoteApply::new());
        let first = change("a");
        let created = first.created_at;
        queue.enqueue(first).unwrap();
        queue.enqueue(change("b")).unwrap();

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.pending, 2);
        assert!(!snapshot.online);
        assert_eq!(snapshot.oldest_pending, Some(created));
        assert_eq!(snapshot.dead_letters, 0);
    }
}
