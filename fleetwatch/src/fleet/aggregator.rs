//! Fleet Aggregator - single owner of the shared fleet state.
//!
//! Every connection funnels its reports into [`FleetAggregator::apply`]. Each
//! apply runs under one write lock:
//!
//! 1. Record the update time
//! 2. Reopen a session if the fleet was inactive
//! 3. Count the MMSI
//! 4. Replace the latest report wholesale (last write wins)
//! 5. Queue the resulting [`FleetEvent`] for delivery
//!
//! Queueing never blocks: when the [`EventQueue`] is full its oldest report
//! event is dropped and counted. The inactivity monitor calls
//! [`FleetAggregator::expire_if_stale`] to end a session.
//!
//! # Usage
//!
//! ```ignore
//! let (broadcast_tx, _) = broadcast::channel(64);
//! let aggregator = FleetAggregator::new(broadcast_tx);
//! let fanout = spawn_event_fanout(aggregator.event_queue(), ...);
//!
//! let event = aggregator.apply(report);
//! assert_eq!(event.status, FleetStatus::Active);
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::queue::{EventQueue, DEFAULT_EVENT_QUEUE_CAPACITY};
use super::state::{FleetEvent, FleetSnapshot, FleetStatus, SessionId, VesselReport};

/// Configuration for the fleet aggregator.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Time without reports after which the fleet is marked inactive.
    pub stale_after: Duration,

    /// How often the inactivity monitor checks for staleness.
    pub poll_interval: Duration,

    /// Capacity of the delivery queue between aggregator and fan-out.
    pub event_queue_capacity: usize,

    /// Capacity of the subscriber broadcast channel.
    pub broadcast_capacity: usize,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            broadcast_capacity: 64,
        }
    }
}

/// Internal state for the aggregator.
#[derive(Default)]
struct FleetState {
    latest: Option<VesselReport>,
    status: FleetStatus,
    last_update: Option<Instant>,
    mmsis: HashSet<u32>,
    last_source: Option<SocketAddr>,
    session: Option<SessionId>,
    sessions_opened: u64,
}

/// Fleet aggregator - combines reports from all connections.
pub struct FleetAggregator {
    state: RwLock<FleetState>,

    /// Delivery queue feeding the fan-out task.
    events: Arc<EventQueue>,

    /// Subscriber channel (fed by the fan-out task).
    broadcast_tx: broadcast::Sender<FleetEvent>,

    config: FleetConfig,
}

impl FleetAggregator {
    /// Create a new aggregator with default configuration.
    pub fn new(broadcast_tx: broadcast::Sender<FleetEvent>) -> Self {
        Self::with_config(broadcast_tx, FleetConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(broadcast_tx: broadcast::Sender<FleetEvent>, config: FleetConfig) -> Self {
        Self {
            state: RwLock::new(FleetState::default()),
            events: Arc::new(EventQueue::new(config.event_queue_capacity)),
            broadcast_tx,
            config,
        }
    }

    /// Apply a report received now.
    pub fn apply(&self, report: VesselReport) -> FleetEvent {
        self.apply_at(report, Instant::now())
    }

    /// Apply a report received at `now`.
    pub fn apply_at(&self, report: VesselReport, now: Instant) -> FleetEvent {
        let mut state = self.state.write();

        state.last_update = Some(now);

        if state.status == FleetStatus::Inactive {
            state.status = FleetStatus::Active;
            state.sessions_opened += 1;
            let session = SessionId {
                number: state.sessions_opened,
                started_at: Utc::now(),
            };
            tracing::info!(
                session = session.number,
                source = %report.source,
                transport = %report.transport,
                "Fleet active, session opened"
            );
            state.session = Some(session);
        }

        if let Some(mmsi) = report.mmsi {
            if state.mmsis.insert(mmsi) {
                tracing::debug!(mmsi, fleet_count = state.mmsis.len(), "New vessel");
            }
        }

        state.last_source = Some(report.source);
        let event = FleetEvent::report(&report, state.mmsis.len(), state.session);
        state.latest = Some(report);

        self.events.push(event.clone());
        event
    }

    /// Mark the fleet inactive if the last report is older than the threshold.
    ///
    /// Returns the inactivity event when the transition happens. Fires at
    /// most once per active period.
    pub fn expire_if_stale(&self, now: Instant) -> Option<FleetEvent> {
        let mut state = self.state.write();

        if state.status != FleetStatus::Active {
            return None;
        }
        let elapsed = now.saturating_duration_since(state.last_update?);
        if elapsed <= self.config.stale_after {
            return None;
        }

        state.latest = None;
        state.status = FleetStatus::Inactive;
        let session = state.session.take();

        tracing::info!(
            idle_secs = elapsed.as_secs(),
            session = ?session.map(|s| s.number),
            "No data for {} seconds, marking inactive",
            self.config.stale_after.as_secs()
        );

        let event = FleetEvent::inactive(state.last_source, state.mmsis.len(), session);
        self.events.push(event.clone());
        Some(event)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> FleetSnapshot {
        let state = self.state.read();
        FleetSnapshot {
            latest: state.latest.clone(),
            status: state.status,
            last_update: state.last_update,
            fleet_count: state.mmsis.len(),
            last_source: state.last_source,
            session: state.session,
        }
    }

    /// Current activity status.
    pub fn status(&self) -> FleetStatus {
        self.state.read().status
    }

    /// Number of distinct MMSIs seen since startup.
    pub fn fleet_count(&self) -> usize {
        self.state.read().mmsis.len()
    }

    /// Most recent report, if active.
    pub fn latest(&self) -> Option<VesselReport> {
        self.state.read().latest.clone()
    }

    /// Subscribe to published events.
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Sender side of the subscriber channel, for the fan-out task.
    pub fn broadcast_sender(&self) -> broadcast::Sender<FleetEvent> {
        self.broadcast_tx.clone()
    }

    /// Delivery queue, drained by the fan-out task.
    pub fn event_queue(&self) -> Arc<EventQueue> {
        Arc::clone(&self.events)
    }

    /// Report events dropped because the delivery queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }

    /// Get the configuration.
    pub fn config(&self) -> &FleetConfig {
        &self.config
    }
}
