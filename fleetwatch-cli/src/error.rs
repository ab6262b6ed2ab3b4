//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and a single exit code.

use std::fmt;
use std::path::PathBuf;
use std::process;

use fleetwatch::config::ConfigFileError;
use fleetwatch::server::ServerError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit { path: PathBuf, error: std::io::Error },
    /// Configuration error
    Config(ConfigFileError),
    /// Failed to build the async runtime
    Runtime(std::io::Error),
    /// Failed to install the Ctrl+C handler
    SignalHandler(String),
    /// Ingest service failed to start
    Serve(ServerError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Serve(ServerError::Bind { .. }) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. Another fleetwatch instance is already running");
                eprintln!("  2. Ports below 1024 need elevated privileges");
                eprintln!("  Use --tcp-port / --udp-port or edit 'fleetwatch config path'.");
            }
            CliError::Config(ConfigFileError::InvalidValue { .. }) => {
                eprintln!();
                eprintln!("Fix the value in the configuration file or remove it to use the default.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit { path, error } => {
                write!(f, "Failed to initialize logging at '{}': {}", path.display(), error)
            }
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::SignalHandler(msg) => write!(f, "Failed to set signal handler: {}", msg),
            CliError::Serve(e) => write!(f, "Ingest service error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit { error, .. } => Some(error),
            CliError::Config(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Serve(e) => Some(e),
            CliError::SignalHandler(_) => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<ServerError> for CliError {
    fn from(e: ServerError) -> Self {
        CliError::Serve(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use fleetwatch::fleet::Transport;

    #[test]
    fn test_bind_error_message() {
        let addr: SocketAddr = "0.0.0.0:1280".parse().unwrap();
        let err = CliError::from(ServerError::Bind {
            transport: Transport::Tcp,
            addr,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        });
        let message = err.to_string();
        assert!(message.starts_with("Ingest service error"));
        assert!(message.contains("0.0.0.0:1280"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_error_message() {
        let err = CliError::from(ConfigFileError::InvalidValue {
            section: "tcp".to_string(),
            key: "port".to_string(),
            value: "abc".to_string(),
            reason: "not a number".to_string(),
        });
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
