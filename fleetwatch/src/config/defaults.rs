//! Default values for all configuration settings.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::fleet::session_log::DEFAULT_SESSION_LOG_DIR;
use crate::ingest::DEFAULT_MAX_BUFFER_SIZE;

/// Default bind address (all interfaces).
pub const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Default TCP ingest port.
pub const DEFAULT_TCP_PORT: u16 = 1280;

/// Default UDP ingest port.
pub const DEFAULT_UDP_PORT: u16 = 1281;

/// Default socket read size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Default staleness threshold in seconds.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 5;

/// Default inactivity poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default delivery queue capacity.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Default subscriber channel capacity.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Default shutdown grace period in seconds.
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 5;

/// Default diagnostic log file (~/.fleetwatch/fleetwatch.log).
pub fn default_log_file() -> PathBuf {
    config_directory().join("fleetwatch.log")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            tcp: ListenerSettings {
                bind: DEFAULT_BIND,
                port: DEFAULT_TCP_PORT,
            },
            udp: ListenerSettings {
                bind: DEFAULT_BIND,
                port: DEFAULT_UDP_PORT,
            },
            ingest: IngestSettings {
                max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
                read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            },
            fleet: FleetSettings {
                stale_after_secs: DEFAULT_STALE_AFTER_SECS,
                poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
                event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
                broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            },
            session_log: SessionLogSettings {
                directory: PathBuf::from(DEFAULT_SESSION_LOG_DIR),
                enabled: true,
            },
            logging: LoggingSettings {
                file: default_log_file(),
            },
            shutdown: ShutdownSettings {
                grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            },
        }
    }
}
