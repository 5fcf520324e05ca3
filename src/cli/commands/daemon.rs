//! Long-running sync daemon.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::sync::{spawn_connectivity_listener, ConnectivityMonitor, SyncEvent, SyncQueue, SyncScheduler};

/// Sync on every reconnect and on a fixed interval until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the signal handler cannot be installed, a background
/// task panics, or the final flush fails. Passes still in flight finish
/// their current remote call before the queue is flushed.
pub async fn daemon(
    queue: SyncQueue,
    client: Client,
    config: &Config,
    interval: Option<u64>,
) -> Result<String, Error> {
    let interval = interval.map_or_else(|| config.sync.interval(), Duration::from_secs);
    if interval.is_zero() {
        return Err(Error::InvalidInput("--interval must be positive".to_string()));
    }

    let cancel = CancellationToken::new();
    let logger_cancel = CancellationToken::new();
    let events = spawn_event_logger(&queue, logger_cancel.clone());

    let monitor = ConnectivityMonitor::new(
        client,
        config.probe_url(),
        Duration::from_secs(config.connectivity.probe_interval_secs),
    );
    let listener = spawn_connectivity_listener(queue.clone(), monitor.subscribe(), cancel.clone());
    let probe = monitor.spawn(cancel.clone());
    let scheduler = SyncScheduler::new(interval).spawn(queue.clone(), cancel.clone());

    info!(
        interval_secs = interval.as_secs(),
        pending = queue.pending_count(),
        "daemon started"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();

    for task in [listener, probe, scheduler] {
        task.await?;
    }
    // Reconnect passes are owned by the queue; wait for them before flushing.
    queue.shutdown().await?;
    logger_cancel.cancel();
    events.await?;

    Ok(format!("Stopped with {} pending changes", queue.pending_count()))
}

fn spawn_event_logger(queue: &SyncQueue, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    let mut rx = queue.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                event = rx.recv() => event,
            };
            match event {
                Ok(SyncEvent::StatusChanged(status)) => info!(%status, "sync status changed"),
                Ok(SyncEvent::DeadLettered(letter)) => warn!(
                    id = %letter.change.id,
                    change_type = letter.change.change_type.as_str(),
                    reason = %letter.reason,
                    "change dead-lettered"
                ),
                Ok(SyncEvent::StorageFailed(reason)) => error!(%reason, "queue persistence failed"),
                Ok(SyncEvent::LoadRecovered(reason)) => {
                    warn!(%reason, "persisted queue was unreadable and has been reset");
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event logger fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
