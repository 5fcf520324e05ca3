//! Connectivity signal source.
//!
//! Connectivity reaches the queue as a `watch::Receiver<bool>`. Hosts with a
//! platform network monitor can publish into a channel directly;
//! [`ConnectivityMonitor`] derives the signal by probing the backend.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::queue::SyncQueue;

/// Forward connectivity changes from `signal` into the queue.
///
/// The current value is applied immediately. The task ends when the sender is
/// dropped or `cancel` fires.
pub fn spawn_connectivity_listener(
    queue: SyncQueue,
    mut signal: watch::Receiver<bool>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let initial = *signal.borrow_and_update();
        let _ = queue.set_connectivity(initial);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                changed = signal.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *signal.borrow_and_update();
                    let _ = queue.set_connectivity(online);
                }
            }
        }
        debug!("connectivity listener stopped");
    })
}

/// Probes a health endpoint and publishes reachability.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    client: Client,
    probe_url: String,
    interval: Duration,
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Create a monitor for `probe_url`. Starts out offline.
    #[must_use]
    pub fn new(client: Client, probe_url: String, interval: Duration) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            client,
            probe_url,
            interval,
            tx,
        }
    }

    /// A new receiver for the connectivity signal.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Probe once and publish the result. Returns whether the backend answered.
    pub async fn probe(&self) -> bool {
        let online = match self.client.get(&self.probe_url).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                debug!(error = %e, "connectivity probe failed");
                false
            },
        };
        self.publish(online);
        online
    }

    /// Publish a reachability value, notifying receivers only on change.
    pub fn publish(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, url = %self.probe_url, "reachability changed");
        }
    }

    /// Probe on a fixed interval until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.probe().await;
                    }
                }
            }
        })
    }
}
