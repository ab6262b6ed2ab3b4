//! Core state types for fleet tracking.
//!
//! - [`VesselReport`] - One normalized vessel update, whatever the wire format
//! - [`FleetStatus`] - Is any sender currently feeding us data?
//! - [`SessionId`] - One contiguous period of activity
//! - [`FleetEvent`] - Published record of a state change
//! - [`FleetSnapshot`] - Read-only copy of the aggregated state

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Transport a report arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Wire format a report was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportProtocol {
    /// AIS NMEA 0183 sentence.
    Nmea,
    /// MAVLink `AIS_VESSEL` frame.
    Mavlink,
}

/// Where a report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOrigin {
    pub source: SocketAddr,
    pub transport: Transport,
}

impl ReportOrigin {
    pub fn new(source: SocketAddr, transport: Transport) -> Self {
        Self { source, transport }
    }
}

/// A normalized vessel update.
///
/// Absent values are `None`; decoders never substitute placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VesselReport {
    pub mmsi: Option<u32>,
    /// Decimal degrees, `[-90, 90]`.
    pub latitude: Option<f64>,
    /// Decimal degrees, `[-180, 180]`.
    pub longitude: Option<f64>,
    /// True heading in degrees, `[0, 360)`.
    pub heading: Option<f32>,
    /// Course over ground in degrees, `[0, 360)`.
    pub course_over_ground: Option<f32>,
    /// Speed over ground in knots.
    pub speed_over_ground: Option<f32>,
    pub name: Option<String>,
    pub callsign: Option<String>,
    pub vessel_type: Option<u8>,
    pub source: SocketAddr,
    pub transport: Transport,
    pub protocol: ReportProtocol,
    pub decoded_at: DateTime<Utc>,
}

impl VesselReport {
    /// An empty report from `origin`, decoded now.
    pub fn empty(origin: &ReportOrigin, protocol: ReportProtocol) -> Self {
        Self {
            mmsi: None,
            latitude: None,
            longitude: None,
            heading: None,
            course_over_ground: None,
            speed_over_ground: None,
            name: None,
            callsign: None,
            vessel_type: None,
            source: origin.source,
            transport: origin.transport,
            protocol,
            decoded_at: Utc::now(),
        }
    }

    /// Returns true if both coordinates are present.
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Fleet activity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FleetStatus {
    /// Reports arrived within the staleness threshold.
    Active,
    /// No reports yet, or the last one is older than the threshold.
    #[default]
    Inactive,
}

impl fmt::Display for FleetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// Identifies one period of activity between two inactivity transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionId {
    /// Monotonic per process, starting at 1.
    pub number: u64,
    pub started_at: DateTime<Utc>,
}

impl SessionId {
    /// Log file name for this session, e.g. `ais_log_20240131_142501.log`.
    pub fn file_name(&self) -> String {
        format!("ais_log_{}.log", self.started_at.format("%Y%m%d_%H%M%S"))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.number, self.started_at.to_rfc3339())
    }
}

/// Kind of published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A report was applied.
    Report,
    /// The fleet went stale.
    Inactive,
}

/// Published record of a fleet state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetEvent {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub status: FleetStatus,
    pub mmsi: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub heading: Option<f32>,
    pub course: Option<f32>,
    pub speed: Option<f32>,
    pub name: Option<String>,
    pub callsign: Option<String>,
    pub vessel_type: Option<u8>,
    pub source: Option<SocketAddr>,
    /// Number of distinct MMSIs seen since startup.
    pub fleet_count: usize,
    pub session: Option<SessionId>,
}

impl FleetEvent {
    /// Event for an applied report.
    pub fn report(report: &VesselReport, fleet_count: usize, session: Option<SessionId>) -> Self {
        Self {
            kind: EventKind::Report,
            timestamp: Utc::now(),
            status: FleetStatus::Active,
            mmsi: report.mmsi,
            latitude: report.latitude,
            longitude: report.longitude,
            heading: report.heading,
            course: report.course_over_ground,
            speed: report.speed_over_ground,
            name: report.name.clone(),
            callsign: report.callsign.clone(),
            vessel_type: report.vessel_type,
            source: Some(report.source),
            fleet_count,
            session,
        }
    }

    /// Event for the transition to inactive. All vessel fields are cleared.
    pub fn inactive(
        source: Option<SocketAddr>,
        fleet_count: usize,
        session: Option<SessionId>,
    ) -> Self {
        Self {
            kind: EventKind::Inactive,
            timestamp: Utc::now(),
            status: FleetStatus::Inactive,
            mmsi: None,
            latitude: None,
            longitude: None,
            heading: None,
            course: None,
            speed: None,
            name: None,
            callsign: None,
            vessel_type: None,
            source,
            fleet_count,
            session,
        }
    }
}

/// Read-only copy of the aggregated fleet state.
#[derive(Debug, Clone)]
pub struct FleetSnapshot {
    /// Most recent report; `None` before the first report and after going stale.
    pub latest: Option<VesselReport>,
    pub status: FleetStatus,
    pub last_update: Option<Instant>,
    pub fleet_count: usize,
    /// Address of the most recent sender.
    pub last_source: Option<SocketAddr>,
    /// Current session, if active.
    pub session: Option<SessionId>,
}
