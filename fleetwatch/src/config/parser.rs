//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::{ConfigFile, ListenerSettings};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [tcp] / [udp] sections
    if let Some(section) = ini.section(Some("tcp")) {
        parse_listener(section, "tcp", &mut config.tcp)?;
    }
    if let Some(section) = ini.section(Some("udp")) {
        parse_listener(section, "udp", &mut config.udp)?;
    }

    // [ingest] section
    if let Some(section) = ini.section(Some("ingest")) {
        if let Some(v) = section.get("max_buffer_size") {
            config.ingest.max_buffer_size = parse_positive(
                "ingest",
                "max_buffer_size",
                v,
                "must be a positive integer (bytes)",
            )?;
        }
        if let Some(v) = section.get("read_buffer_size") {
            config.ingest.read_buffer_size = parse_positive(
                "ingest",
                "read_buffer_size",
                v,
                "must be a positive integer (bytes)",
            )?;
        }
    }

    // [fleet] section
    if let Some(section) = ini.section(Some("fleet")) {
        if let Some(v) = section.get("stale_after_secs") {
            config.fleet.stale_after_secs = parse_positive(
                "fleet",
                "stale_after_secs",
                v,
                "must be a positive integer (seconds)",
            )?;
        }
        if let Some(v) = section.get("poll_interval_ms") {
            config.fleet.poll_interval_ms = parse_positive(
                "fleet",
                "poll_interval_ms",
                v,
                "must be a positive integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("event_queue_capacity") {
            config.fleet.event_queue_capacity = parse_positive(
                "fleet",
                "event_queue_capacity",
                v,
                "must be a positive integer",
            )?;
        }
        if let Some(v) = section.get("broadcast_capacity") {
            config.fleet.broadcast_capacity = parse_positive(
                "fleet",
                "broadcast_capacity",
                v,
                "must be a positive integer",
            )?;
        }
    }

    // [session_log] section
    if let Some(section) = ini.section(Some("session_log")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.session_log.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("enabled") {
            config.session_log.enabled = parse_bool(v);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    // [shutdown] section
    if let Some(section) = ini.section(Some("shutdown")) {
        if let Some(v) = section.get("grace_period_secs") {
            config.shutdown.grace_period_secs = parse_value(
                "shutdown",
                "grace_period_secs",
                v,
                "must be a non-negative integer (seconds)",
            )?;
        }
    }

    Ok(config)
}

fn parse_listener(
    section: &Properties,
    name: &str,
    listener: &mut ListenerSettings,
) -> Result<(), ConfigFileError> {
    if let Some(v) = section.get("bind") {
        listener.bind = parse_value::<IpAddr>(name, "bind", v, "must be an IPv4 or IPv6 address")?;
    }
    if let Some(v) = section.get("port") {
        listener.port = parse_value(name, "port", v, "must be a port number (0-65535)")?;
    }
    Ok(())
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        })
}

fn parse_positive<T: FromStr + PartialOrd + Default>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    let parsed: T = parse_value(section, key, value, reason)?;
    if parsed <= T::default() {
        return Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        });
    }
    Ok(parsed)
}

/// Parse a boolean string value.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
