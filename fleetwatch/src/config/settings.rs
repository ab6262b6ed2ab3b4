//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::net::IpAddr;
use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub tcp: ListenerSettings,
    pub udp: ListenerSettings,
    pub ingest: IngestSettings,
    pub fleet: FleetSettings,
    pub session_log: SessionLogSettings,
    pub logging: LoggingSettings,
    pub shutdown: ShutdownSettings,
}

/// `[tcp]` and `[udp]` listener configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerSettings {
    /// Address to bind.
    pub bind: IpAddr,
    /// Port to bind (0 picks an ephemeral port).
    pub port: u16,
}

/// `[ingest]` framing limits.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    /// Bytes a connection may buffer without seeing a sentence delimiter.
    pub max_buffer_size: usize,
    /// Size of each socket read.
    pub read_buffer_size: usize,
}

/// `[fleet]` aggregation and delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetSettings {
    pub stale_after_secs: u64,
    pub poll_interval_ms: u64,
    pub event_queue_capacity: usize,
    pub broadcast_capacity: usize,
}

/// `[session_log]` per-session JSON logs.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLogSettings {
    pub directory: PathBuf,
    pub enabled: bool,
}

/// `[logging]` diagnostic log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub file: PathBuf,
}

/// `[shutdown]` behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownSettings {
    /// How long units get to finish after cancellation before being aborted.
    pub grace_period_secs: u64,
}
