//! Provider traits and shared wrapper for fleet state.
//!
//! - [`FleetStateProvider`] - Query API (pull)
//! - [`FleetBroadcaster`] - Subscription API (push)
//! - [`SharedFleetState`] - Cloneable handle implementing both

use std::sync::Arc;

use tokio::sync::broadcast;

use super::aggregator::FleetAggregator;
use super::state::{FleetEvent, FleetSnapshot, FleetStatus, VesselReport};

/// Trait for querying fleet state (pull API).
pub trait FleetStateProvider: Send + Sync {
    /// Full copy of the current state.
    fn snapshot(&self) -> FleetSnapshot;

    /// Current activity status.
    fn status(&self) -> FleetStatus;

    /// Number of distinct MMSIs seen since startup.
    fn fleet_count(&self) -> usize;

    /// Most recent report, if the fleet is active.
    fn latest(&self) -> Option<VesselReport>;
}

/// Trait for subscribing to fleet events (push API).
pub trait FleetBroadcaster: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<FleetEvent>;
}

/// Shared fleet state handle.
///
/// ```ignore
/// let fleet = service.fleet();
/// println!("{} vessels seen, {}", fleet.fleet_count(), fleet.status());
///
/// let mut rx = fleet.subscribe();
/// while let Ok(event) = rx.recv().await {
///     // Handle event
/// }
/// ```
#[derive(Clone)]
pub struct SharedFleetState {
    inner: Arc<FleetAggregator>,
}

impl SharedFleetState {
    pub fn new(aggregator: Arc<FleetAggregator>) -> Self {
        Self { inner: aggregator }
    }

    /// Access the underlying aggregator.
    pub fn aggregator(&self) -> &Arc<FleetAggregator> {
        &self.inner
    }
}

impl FleetStateProvider for SharedFleetState {
    fn snapshot(&self) -> FleetSnapshot {
        self.inner.snapshot()
    }

    fn status(&self) -> FleetStatus {
        self.inner.status()
    }

    fn fleet_count(&self) -> usize {
        self.inner.fleet_count()
    }

    fn latest(&self) -> Option<VesselReport> {
        self.inner.latest()
    }
}

impl FleetBroadcaster for SharedFleetState {
    fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.inner.subscribe()
    }
}
