//! Run command - start the ingest service and serve until Ctrl+C.

use std::path::PathBuf;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use fleetwatch::config::ConfigFile;
use fleetwatch::fleet::{EventKind, FleetBroadcaster, FleetEvent, FleetStateProvider};
use fleetwatch::server::{IngestService, IngestServiceConfig};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the run command.
#[derive(Debug, Default)]
pub struct RunArgs {
    pub tcp_port: Option<u16>,
    pub udp_port: Option<u16>,
    pub log_dir: Option<PathBuf>,
    pub no_session_log: bool,
    pub debug: bool,
    pub quiet: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_options(args.debug, !args.quiet)?;
    runner.log_startup("run");

    let config = apply_overrides(runner.config().clone(), &args);
    let service_config = IngestServiceConfig::from(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(serve(service_config, args.quiet))
}

/// Command-line flags take precedence over the config file.
fn apply_overrides(mut config: ConfigFile, args: &RunArgs) -> ConfigFile {
    if let Some(port) = args.tcp_port {
        config.tcp.port = port;
    }
    if let Some(port) = args.udp_port {
        config.udp.port = port;
    }
    if let Some(dir) = &args.log_dir {
        config.session_log.directory = dir.clone();
    }
    if args.no_session_log {
        config.session_log.enabled = false;
    }
    config
}

async fn serve(config: IngestServiceConfig, quiet: bool) -> Result<(), CliError> {
    let session_dir = config.session_log.enabled.then(|| config.session_log.directory.clone());
    let service = IngestService::start(config).await?;

    println!("fleetwatch v{}", env!("CARGO_PKG_VERSION"));
    println!("  TCP: {}", service.tcp_addr());
    println!("  UDP: {}", service.udp_addr());
    match &session_dir {
        Some(dir) => println!("  Session logs: {}", dir.display()),
        None => println!("  Session logs: disabled"),
    }
    println!();
    println!("Press Ctrl+C to stop.");

    let cancellation = service.cancellation_token();
    let handler_token = cancellation.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| CliError::SignalHandler(e.to_string()))?;

    let fleet = service.fleet();
    let printer = (!quiet).then(|| {
        let mut rx = fleet.subscribe();
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(event) => println!("{}", format_event(&event)),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Console output lagging, events skipped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        })
    });

    cancellation.cancelled().await;
    println!();
    println!("Shutdown signal received, stopping...");

    service.shutdown().await;
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    info!(fleet_count = fleet.fleet_count(), "fleetwatch stopped");
    println!("Shutdown complete. {} vessel(s) seen.", fleet.fleet_count());
    Ok(())
}

fn format_event(event: &FleetEvent) -> String {
    let source = event
        .source
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());

    match event.kind {
        EventKind::Inactive => format!("[{}] fleet inactive ({} seen)", source, event.fleet_count),
        EventKind::Report => format!(
            "[{}] MMSI={} Lat={} Lon={} Heading={} Name={} ({} seen)",
            source,
            show(event.mmsi),
            event.latitude.map_or("-".to_string(), |v| format!("{:.6}", v)),
            event.longitude.map_or("-".to_string(), |v| format!("{:.6}", v)),
            show(event.heading),
            event.name.as_deref().unwrap_or("-"),
            event.fleet_count
        ),
    }
}

fn show<T: ToString>(value: Option<T>) -> String {
    value.map_or("-".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_take_precedence() {
        let args = RunArgs {
            tcp_port: Some(9000),
            log_dir: Some(PathBuf::from("/tmp/ais")),
            no_session_log: true,
            ..Default::default()
        };
        let config = apply_overrides(ConfigFile::default(), &args);
        assert_eq!(config.tcp.port, 9000);
        assert_eq!(config.udp.port, ConfigFile::default().udp.port);
        assert_eq!(config.session_log.directory, PathBuf::from("/tmp/ais"));
        assert!(!config.session_log.enabled);
    }

    #[test]
    fn test_no_overrides_keeps_file_values() {
        let config = apply_overrides(ConfigFile::default(), &RunArgs::default());
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_format_inactive_event() {
        let event = FleetEvent::inactive(Some("10.0.0.5:4000".parse().unwrap()), 3, None);
        assert_eq!(format_event(&event), "[10.0.0.5:4000] fleet inactive (3 seen)");
    }
}
