//! Error types for the ingest servers.

use std::net::SocketAddr;

use thiserror::Error;

use crate::fleet::{SessionLogError, Transport};

/// Errors starting the ingest service.
///
/// Only startup can fail; once running, transport errors end the affected
/// connection and are logged.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind a listener.
    #[error("Failed to bind {transport} listener on {addr}: {source}")]
    Bind {
        transport: Transport,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Socket I/O error outside of a connection.
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    /// Session log directory could not be prepared.
    #[error(transparent)]
    SessionLog(#[from] SessionLogError),
}
