//! Fleet state: normalization, aggregation, staleness and event delivery.
//!
//! # Data flow
//!
//! ```text
//! decoded message ──► normalize ──► FleetAggregator ──► EventQueue ──► fan-out ──┬─► SessionLog
//!                                        ▲                                        └─► broadcast
//!                                        │
//!                              inactivity monitor
//! ```
//!
//! # Components
//!
//! - [`state`] - `VesselReport`, `FleetStatus`, `SessionId`, `FleetEvent`
//! - [`normalize`] - AIS / MAVLink message to `VesselReport`
//! - [`aggregator`] - `FleetAggregator`, the only owner of mutable state
//! - [`monitor`] - Background staleness check
//! - [`queue`] - Drop-oldest delivery queue
//! - [`fanout`] - Delivery task feeding the session log and subscribers
//! - [`session_log`] - Per-session JSON lines files
//! - [`provider`] - Query and subscription traits

pub mod aggregator;
pub mod fanout;
pub mod monitor;
pub mod normalize;
pub mod provider;
pub mod queue;
pub mod session_log;
pub mod state;

pub use aggregator::{FleetAggregator, FleetConfig};
pub use fanout::spawn_event_fanout;
pub use monitor::{spawn_inactivity_monitor, DEFAULT_POLL_INTERVAL};
pub use provider::{FleetBroadcaster, FleetStateProvider, SharedFleetState};
pub use queue::{EventQueue, DEFAULT_EVENT_QUEUE_CAPACITY};
pub use session_log::{SessionLog, SessionLogConfig, SessionLogError};
pub use state::{
    EventKind, FleetEvent, FleetSnapshot, FleetStatus, ReportOrigin, ReportProtocol, SessionId,
    Transport, VesselReport,
};
