//! Inactivity monitor daemon.
//!
//! Polls [`FleetAggregator::expire_if_stale`] on a fixed interval so the fleet
//! goes inactive even when no more reports arrive to trigger the check.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::aggregator::FleetAggregator;

/// Default polling interval (1 second).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns a background task that expires stale fleet state.
///
/// Stops when the cancellation token is triggered.
pub fn spawn_inactivity_monitor(
    aggregator: Arc<FleetAggregator>,
    cancellation: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // interval() panics on a zero period
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(event) = aggregator.expire_if_stale(Instant::now()) {
                        tracing::debug!(
                            fleet_count = event.fleet_count,
                            "Inactivity monitor expired fleet state"
                        );
                    }
                }
                _ = cancellation.cancelled() => {
                    tracing::debug!("Inactivity monitor stopped");
                    break;
                }
            }
        }
    })
}
