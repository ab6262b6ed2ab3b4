//! CLI runner for common setup.
//!
//! Loads the configuration file and initializes logging for commands that
//! start the service.

use tracing::info;

use fleetwatch::config::{config_file_path, ConfigFile};
use fleetwatch::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load config and initialize logging.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - When true, defaults to debug-level logging if RUST_LOG is unset
    /// * `stdout` - Mirror log output to stdout
    pub fn with_options(debug_mode: bool, stdout: bool) -> Result<Self, CliError> {
        // Missing file means defaults
        let config = ConfigFile::load()?;

        let log_path = config.logging.file.clone();
        let logging_guard =
            init_logging(&log_path, stdout, debug_mode).map_err(|error| CliError::LoggingInit {
                path: log_path,
                error,
            })?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("fleetwatch v{}", env!("CARGO_PKG_VERSION"));
        info!(
            config = %config_file_path().display(),
            log_file = %self.config.logging.file.display(),
            "fleetwatch CLI: {} command",
            command
        );
    }
}
