//! Connection management and service lifecycle.
//!
//! [`IngestService`] owns every long-running unit:
//!
//! | Unit              | Task                                 |
//! |-------------------|--------------------------------------|
//! | TCP listener      | accept loop + one task per connection |
//! | UDP listener      | single receive loop                  |
//! | Inactivity monitor| periodic staleness check             |
//! | Event fan-out     | session log + subscriber broadcast   |
//!
//! Ingest units and the monitor share one [`CancellationToken`]. The fan-out
//! has its own token, cancelled only after the ingest units are done, so
//! events produced during shutdown are still delivered.

mod error;
pub mod tcp;
pub mod udp;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ConfigFile;
use crate::fleet::{
    spawn_event_fanout, spawn_inactivity_monitor, FleetAggregator, FleetConfig, SessionLog,
    SessionLogConfig, SharedFleetState,
};

pub use error::ServerError;
pub use tcp::{TcpIngestServer, TcpServerConfig};
pub use udp::{UdpIngestServer, UdpServerConfig};

/// Everything needed to start the service.
#[derive(Debug, Clone)]
pub struct IngestServiceConfig {
    pub tcp: TcpServerConfig,
    pub udp: UdpServerConfig,
    pub fleet: FleetConfig,
    pub session_log: SessionLogConfig,
    /// Time units get to stop after cancellation before they are aborted.
    pub shutdown_grace: Duration,
}

impl Default for IngestServiceConfig {
    fn default() -> Self {
        Self {
            tcp: TcpServerConfig::default(),
            udp: UdpServerConfig::default(),
            fleet: FleetConfig::default(),
            session_log: SessionLogConfig::default(),
            shutdown_grace: Duration::from_secs(crate::config::DEFAULT_GRACE_PERIOD_SECS),
        }
    }
}

impl From<&ConfigFile> for IngestServiceConfig {
    fn from(config: &ConfigFile) -> Self {
        Self {
            tcp: TcpServerConfig {
                bind: config.tcp.bind,
                port: config.tcp.port,
                max_buffer_size: config.ingest.max_buffer_size,
                read_buffer_size: config.ingest.read_buffer_size,
            },
            udp: UdpServerConfig {
                bind: config.udp.bind,
                port: config.udp.port,
            },
            fleet: FleetConfig {
                stale_after: Duration::from_secs(config.fleet.stale_after_secs),
                poll_interval: Duration::from_millis(config.fleet.poll_interval_ms),
                event_queue_capacity: config.fleet.event_queue_capacity,
                broadcast_capacity: config.fleet.broadcast_capacity,
            },
            session_log: SessionLogConfig {
                directory: config.session_log.directory.clone(),
                enabled: config.session_log.enabled,
            },
            shutdown_grace: Duration::from_secs(config.shutdown.grace_period_secs),
        }
    }
}

/// Running ingest service.
pub struct IngestService {
    fleet: SharedFleetState,
    tcp_addr: SocketAddr,
    udp_addr: SocketAddr,
    cancellation: CancellationToken,
    delivery_cancellation: CancellationToken,
    ingest_units: Vec<(&'static str, JoinHandle<()>)>,
    fanout: JoinHandle<()>,
    shutdown_grace: Duration,
}

impl IngestService {
    /// Bind both listeners and start all units.
    ///
    /// Fails only if a listener cannot be bound or the session log directory
    /// cannot be created.
    pub async fn start(config: IngestServiceConfig) -> Result<Self, ServerError> {
        let (broadcast_tx, _) = broadcast::channel(config.fleet.broadcast_capacity.max(1));
        let aggregator = Arc::new(FleetAggregator::with_config(
            broadcast_tx.clone(),
            config.fleet.clone(),
        ));

        let session_log = if config.session_log.enabled {
            Some(SessionLog::create(
                &config.session_log.directory,
                config.fleet.stale_after,
            )?)
        } else {
            None
        };

        let tcp = TcpIngestServer::bind(config.tcp.clone(), aggregator.clone()).await?;
        let udp = UdpIngestServer::bind(config.udp.clone(), aggregator.clone()).await?;
        let tcp_addr = tcp.local_addr()?;
        let udp_addr = udp.local_addr()?;

        let cancellation = CancellationToken::new();
        let delivery_cancellation = CancellationToken::new();

        let fanout = spawn_event_fanout(
            aggregator.event_queue(),
            broadcast_tx,
            session_log,
            delivery_cancellation.clone(),
        );
        let ingest_units = vec![
            (
                "inactivity monitor",
                spawn_inactivity_monitor(
                    aggregator.clone(),
                    cancellation.clone(),
                    config.fleet.poll_interval,
                ),
            ),
            ("tcp listener", tcp.start(cancellation.clone())),
            ("udp listener", udp.start(cancellation.clone())),
        ];

        info!(
            tcp = %tcp_addr,
            udp = %udp_addr,
            session_log = config.session_log.enabled,
            stale_after_secs = config.fleet.stale_after.as_secs(),
            "Ingest service started"
        );

        Ok(Self {
            fleet: SharedFleetState::new(aggregator),
            tcp_addr,
            udp_addr,
            cancellation,
            delivery_cancellation,
            ingest_units,
            fanout,
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Shared fleet state for queries and subscriptions.
    pub fn fleet(&self) -> SharedFleetState {
        self.fleet.clone()
    }

    /// Bound TCP address.
    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    /// Bound UDP address.
    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// Token that stops the service when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Stop every unit.
    ///
    /// Ingest units get the grace period to finish; stragglers are aborted.
    /// Queued events are then delivered before the fan-out exits.
    pub async fn shutdown(self) {
        info!("Ingest service shutting down");
        self.cancellation.cancel();

        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        for (name, mut handle) in self.ingest_units {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                warn!(unit = name, "Unit did not stop within grace period, aborting");
                handle.abort();
            }
        }

        self.delivery_cancellation.cancel();
        let mut fanout = self.fanout;
        if tokio::time::timeout(self.shutdown_grace, &mut fanout)
            .await
            .is_err()
        {
            warn!("Event fan-out did not drain within grace period, aborting");
            fanout.abort();
        }

        info!("Ingest service stopped");
    }
}
