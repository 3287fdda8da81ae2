use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::shutdown::ShutdownSender;

use super::{MetricsRegistry, MetricsSnapshot};

/// Logs traffic totals every `interval` until shutdown, then logs a final
/// summary and returns it.
#[must_use]
pub fn spawn_stats_reporter(
    registry: Arc<MetricsRegistry>,
    interval: Duration,
    shutdown_tx: &ShutdownSender,
) -> JoinHandle<MetricsSnapshot> {
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately.
        ticker.tick().await;
        let mut previous = MetricsSnapshot::default();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    let current = registry.snapshot();
                    log_interval(&previous, &current, interval);
                    previous = current;
                }
            }
        }
        let last = registry.snapshot();
        info!(
            "Traffic summary: {} bytes across {} streams, {} successful and {} failed requests",
            last.bytes, last.streams, last.successful_requests, last.failed_requests
        );
        last
    })
}

fn log_interval(previous: &MetricsSnapshot, current: &MetricsSnapshot, interval: Duration) {
    let sent = current.bytes.saturating_sub(previous.bytes);
    let ok = current
        .successful_requests
        .saturating_sub(previous.successful_requests);
    let failed = current
        .failed_requests
        .saturating_sub(previous.failed_requests);
    let secs = interval.as_secs().max(1);
    info!(
        "Sent {} bytes ({} B/s), {} ok / {} failed in the last {:?}",
        sent,
        sent.checked_div(secs).unwrap_or(0),
        ok,
        failed,
        interval
    );
}
