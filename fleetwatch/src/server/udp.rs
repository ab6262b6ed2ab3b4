//! UDP ingest listener.
//!
//! A single task reads datagrams and classifies each one on its own: text
//! datagrams are split into sentences, anything else is fed to the MAVLink
//! parser, which is reset afterwards.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::error::ServerError;
use crate::config::{DEFAULT_BIND, DEFAULT_UDP_PORT};
use crate::fleet::{FleetAggregator, ReportOrigin, Transport};
use crate::ingest::Dispatcher;

/// Largest UDP payload.
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Pause after a failed receive (e.g. repeated ICMP errors).
const RECV_BACKOFF: Duration = Duration::from_millis(100);

/// UDP listener configuration.
#[derive(Debug, Clone)]
pub struct UdpServerConfig {
    pub bind: IpAddr,
    pub port: u16,
}

impl Default for UdpServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            port: DEFAULT_UDP_PORT,
        }
    }
}

impl UdpServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Bound UDP ingest socket.
pub struct UdpIngestServer {
    socket: UdpSocket,
    aggregator: Arc<FleetAggregator>,
}

impl UdpIngestServer {
    /// Bind the socket.
    pub async fn bind(
        config: UdpServerConfig,
        aggregator: Arc<FleetAggregator>,
    ) -> Result<Self, ServerError> {
        let addr = config.socket_addr();
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                transport: Transport::Udp,
                addr,
                source,
            })?;

        Ok(Self { socket, aggregator })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Spawn the receive loop.
    pub fn start(self, cancellation: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancellation))
    }

    /// Receive datagrams until cancelled.
    pub async fn run(self, cancellation: CancellationToken) {
        let local_addr = match self.socket.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                warn!(error = %e, "UDP socket has no local address");
                return;
            }
        };
        info!(local_addr = %local_addr, "UDP ingest listener started");

        let mut dispatcher = Dispatcher::new(
            ReportOrigin::new(local_addr, Transport::Udp),
            self.aggregator.clone(),
        );
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut datagrams: u64 = 0;

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, from)) => {
                            datagrams += 1;
                            trace!(from = %from, len, "UDP datagram received");
                            dispatcher.handle_datagram(from, &buffer[..len]);
                        }
                        Err(e) => {
                            // ICMP errors surface here on some platforms; keep receiving.
                            warn!(error = %e, "UDP receive failed");
                            tokio::time::sleep(RECV_BACKOFF).await;
                        }
                    }
                }
                _ = cancellation.cancelled() => {
                    debug!("UDP listener shutting down");
                    break;
                }
            }
        }

        let stats = dispatcher.stats();
        info!(
            datagrams,
            reports = stats.reports,
            decode_errors = stats.decode_errors,
            "UDP ingest listener stopped"
        );
    }
}
