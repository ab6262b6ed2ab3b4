//! TCP ingest listener.
//!
//! One task per accepted connection. Each task owns its [`FrameSplitter`] and
//! [`Dispatcher`], so framing and decoder state are never shared. A
//! connection ends on peer close, read error, buffer overflow or
//! cancellation.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::error::ServerError;
use crate::config::{DEFAULT_BIND, DEFAULT_READ_BUFFER_SIZE, DEFAULT_TCP_PORT};
use crate::fleet::{FleetAggregator, ReportOrigin, Transport};
use crate::ingest::{Dispatcher, FrameSplitter, DEFAULT_MAX_BUFFER_SIZE};

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP listener configuration.
#[derive(Debug, Clone)]
pub struct TcpServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Bound on bytes buffered without a sentence delimiter.
    pub max_buffer_size: usize,
    /// Bytes per socket read.
    pub read_buffer_size: usize,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            port: DEFAULT_TCP_PORT,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl TcpServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Bound TCP ingest listener.
pub struct TcpIngestServer {
    listener: TcpListener,
    config: TcpServerConfig,
    aggregator: Arc<FleetAggregator>,
}

impl TcpIngestServer {
    /// Bind the listener.
    pub async fn bind(
        config: TcpServerConfig,
        aggregator: Arc<FleetAggregator>,
    ) -> Result<Self, ServerError> {
        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                transport: Transport::Tcp,
                addr,
                source,
            })?;

        Ok(Self {
            listener,
            config,
            aggregator,
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Spawn the accept loop.
    pub fn start(self, cancellation: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancellation))
    }

    /// Accept connections until cancelled, then wait for connection tasks.
    pub async fn run(self, cancellation: CancellationToken) {
        let local_addr = self.listener.local_addr().ok();
        info!(local_addr = ?local_addr, "TCP ingest listener started");

        let tracker = TaskTracker::new();
        let mut accepted: u64 = 0;

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            accepted += 1;
                            info!(peer = %peer, "TCP connection accepted");
                            tracker.spawn(handle_connection(
                                stream,
                                peer,
                                self.config.clone(),
                                self.aggregator.clone(),
                                cancellation.clone(),
                            ));
                        }
                        Err(e) => {
                            warn!(error = %e, "TCP accept failed");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
                _ = cancellation.cancelled() => {
                    debug!("TCP listener shutting down");
                    break;
                }
            }
        }

        drop(self.listener);
        tracker.close();
        tracker.wait().await;
        info!(accepted, "TCP ingest listener stopped");
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    config: TcpServerConfig,
    aggregator: Arc<FleetAggregator>,
    cancellation: CancellationToken,
) {
    let mut splitter = FrameSplitter::with_max_buffer_size(config.max_buffer_size);
    let mut dispatcher = Dispatcher::new(ReportOrigin::new(peer, Transport::Tcp), aggregator);
    let mut buffer = vec![0u8; config.read_buffer_size.max(1)];

    loop {
        let read = tokio::select! {
            result = stream.read(&mut buffer) => result,
            _ = cancellation.cancelled() => {
                debug!(peer = %peer, "Closing TCP connection for shutdown");
                break;
            }
        };

        let n = match read {
            Ok(0) => {
                info!(peer = %peer, "TCP connection closed by peer");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(peer = %peer, error = %e, "TCP read failed");
                break;
            }
        };

        match splitter.push(&buffer[..n]) {
            Ok(units) => {
                for unit in units {
                    dispatcher.handle_unit(unit);
                }
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Closing TCP connection");
                break;
            }
        }
    }

    let stats = dispatcher.stats();
    debug!(
        peer = %peer,
        sentences = stats.sentences,
        binary_bytes = stats.binary_bytes,
        reports = stats.reports,
        decode_errors = stats.decode_errors,
        "TCP connection finished"
    );
}
