//! One-shot sync command.

use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::cli::args::OutputFormat;
use crate::error::Error;
use crate::output::format_report;
use crate::sync::{ConnectivityMonitor, SyncQueue};

/// Probe the backend and, if it answers, run one sync pass.
///
/// # Errors
///
/// Returns an error if the pass task fails or output formatting fails.
pub async fn run(
    queue: &SyncQueue,
    client: Client,
    probe_url: String,
    format: OutputFormat,
) -> Result<String, Error> {
    let monitor = ConnectivityMonitor::new(client, probe_url, Duration::from_secs(1));
    let online = monitor.probe().await;
    info!(online, pending = queue.pending_count(), "starting one-shot sync");

    // Going online triggers the pass; awaiting the handle waits for it.
    let report = match queue.set_connectivity(online) {
        Some(pass) => pass.await?,
        None => queue.attempt_sync().await,
    };

    format_report(&report, queue.pending_count(), format)
}
