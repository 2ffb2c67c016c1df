// ABOUTME: Background task that retries cached entries on a fixed period.
// ABOUTME: Skips ticks while auto upload is off, the backoff window is open, or the cache is empty.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::coordinator::CacheCoordinator;

/// Spawn a task that drains `coordinator` every `period`.
///
/// Runs until the returned handle is aborted. A tick that lands while a
/// drain is already running does nothing.
pub fn spawn_periodic_drain(coordinator: CacheCoordinator, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if !coordinator.auto_upload() || coordinator.in_backoff().await {
                continue;
            }
            if !coordinator.has_content().await {
                continue;
            }
            tracing::debug!(period_ms = period.as_millis() as u64, "periodic drain");
            coordinator.drain().await;
        }
    })
}
