//! INI serialization logic for converting `ConfigFile` → INI string.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[tcp]
; Address and port for the TCP ingest listener (default: 0.0.0.0:1280)
bind = {}
port = {}

[udp]
; Address and port for the UDP ingest listener (default: 0.0.0.0:1281)
bind = {}
port = {}

[ingest]
; Maximum bytes a TCP connection may buffer without a sentence terminator.
; Exceeding it closes the connection (default: 65536)
max_buffer_size = {}
; Bytes read from a socket at a time (default: 4096)
read_buffer_size = {}

[fleet]
; Seconds without reports before the fleet is marked inactive (default: 5)
stale_after_secs = {}
; How often the staleness check runs, in milliseconds (default: 1000)
poll_interval_ms = {}
; Queue between aggregator and event delivery; events beyond it are dropped
event_queue_capacity = {}
; Per-subscriber backlog; slow subscribers lose the oldest events
broadcast_capacity = {}

[session_log]
; Directory for per-session ais_log_*.log files (default: ais-logs)
directory = {}
enabled = {}

[logging]
; Diagnostic log file, cleared on each start
file = {}

[shutdown]
; Seconds to wait for connections to close before aborting them (default: 5)
grace_period_secs = {}
"#,
        config.tcp.bind,
        config.tcp.port,
        config.udp.bind,
        config.udp.port,
        config.ingest.max_buffer_size,
        config.ingest.read_buffer_size,
        config.fleet.stale_after_secs,
        config.fleet.poll_interval_ms,
        config.fleet.event_queue_capacity,
        config.fleet.broadcast_capacity,
        path_to_string(&config.session_log.directory),
        config.session_log.enabled,
        path_to_string(&config.logging.file),
        config.shutdown.grace_period_secs,
    )
}

/// Render a path, abbreviating the home directory as `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::settings::ConfigFile;
    use super::*;

    #[test]
    fn test_default_output_contains_sections() {
        let output = to_config_string(&ConfigFile::default());

        for section in [
            "[tcp]",
            "[udp]",
            "[ingest]",
            "[fleet]",
            "[session_log]",
            "[logging]",
            "[shutdown]",
        ] {
            assert!(output.contains(section), "missing {section}");
        }
        assert!(output.contains("port = 1280"));
        assert!(output.contains("port = 1281"));
        assert!(output.contains("directory = ais-logs"));
    }

    #[test]
    fn test_output_parses_back() {
        let mut config = ConfigFile::default();
        config.ingest.read_buffer_size = 8192;
        let parsed = ConfigFile::from_ini_str(&to_config_string(&config)).unwrap();
        assert_eq!(parsed, config);
    }
}
