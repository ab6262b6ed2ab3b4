//! Per-session JSON lines log.
//!
//! Each activity session gets its own file, `ais_log_YYYYMMDD_HHMMSS.log`,
//! holding one JSON object per line:
//!
//! ```text
//! {"timestamp":"2024-01-31T14:25:01.123Z","data":{"kind":"report",...}}
//! {"timestamp":"2024-01-31T14:25:09.456Z","event":"No data for 5 seconds, marking inactive"}
//! ```
//!
//! The file is opened on the first event of a session and closed after the
//! inactivity record.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::{EventKind, FleetEvent, SessionId};

/// Default session log directory, relative to the working directory.
pub const DEFAULT_SESSION_LOG_DIR: &str = "ais-logs";

/// Errors writing the session log.
#[derive(Debug, thiserror::Error)]
pub enum SessionLogError {
    #[error("Failed to create session log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write session log {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Session log configuration.
#[derive(Debug, Clone)]
pub struct SessionLogConfig {
    /// Directory receiving the log files.
    pub directory: PathBuf,
    /// Whether session logs are written at all.
    pub enabled: bool,
}

impl Default for SessionLogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_SESSION_LOG_DIR),
            enabled: true,
        }
    }
}

#[derive(Serialize)]
struct DataRecord<'a> {
    timestamp: DateTime<Utc>,
    data: &'a FleetEvent,
}

#[derive(Serialize)]
struct NoticeRecord {
    timestamp: DateTime<Utc>,
    event: String,
}

struct OpenSession {
    number: u64,
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Writer for the per-session log files.
pub struct SessionLog {
    directory: PathBuf,
    stale_after: Duration,
    current: Option<OpenSession>,
}

impl SessionLog {
    /// Create the log directory and an idle writer.
    ///
    /// `stale_after` is only used to phrase the inactivity record.
    pub fn create(directory: impl Into<PathBuf>, stale_after: Duration) -> Result<Self, SessionLogError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|source| SessionLogError::CreateDir {
            path: directory.clone(),
            source,
        })?;

        Ok(Self {
            directory,
            stale_after,
            current: None,
        })
    }

    /// Path of the currently open session file.
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|s| s.path.as_path())
    }

    /// Log directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Append a record for `event`.
    pub fn record(&mut self, event: &FleetEvent) -> Result<(), SessionLogError> {
        match event.kind {
            EventKind::Report => {
                let Some(session) = event.session else {
                    return Ok(());
                };
                let record = DataRecord {
                    timestamp: event.timestamp,
                    data: event,
                };
                self.ensure_open(&session)?;
                match self.current.as_mut() {
                    Some(open) => write_line(open, &record),
                    None => Ok(()),
                }
            }
            EventKind::Inactive => {
                let Some(mut open) = self.current.take() else {
                    return Ok(());
                };
                let record = NoticeRecord {
                    timestamp: event.timestamp,
                    event: format!(
                        "No data for {} seconds, marking inactive",
                        self.stale_after.as_secs()
                    ),
                };
                write_line(&mut open, &record)?;
                tracing::info!(path = %open.path.display(), "Session log closed");
                Ok(())
            }
        }
    }

    /// Flush and close the current file, if any.
    pub fn close(&mut self) {
        if let Some(mut open) = self.current.take() {
            if let Err(e) = open.writer.flush() {
                tracing::warn!(path = %open.path.display(), error = %e, "Failed to flush session log");
            }
        }
    }

    fn ensure_open(&mut self, session: &SessionId) -> Result<(), SessionLogError> {
        if self.current.as_ref().map(|s| s.number) == Some(session.number) {
            return Ok(());
        }
        self.close();

        let path = self.directory.join(session.file_name());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SessionLogError::Write {
                path: path.clone(),
                source,
            })?;
        tracing::info!(session = session.number, path = %path.display(), "Session log opened");

        self.current = Some(OpenSession {
            number: session.number,
            path,
            writer: BufWriter::new(file),
        });
        Ok(())
    }
}

impl Drop for SessionLog {
    fn drop(&mut self) {
        self.close();
    }
}

fn write_line<T: Serialize>(open: &mut OpenSession, record: &T) -> Result<(), SessionLogError> {
    serde_json::to_writer(&mut open.writer, record)?;
    open.writer
        .write_all(b"\n")
        .and_then(|_| open.writer.flush())
        .map_err(|source| SessionLogError::Write {
            path: open.path.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::state::{ReportOrigin, ReportProtocol, Transport, VesselReport};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn session(number: u64, second: u32) -> SessionId {
        SessionId {
            number,
            started_at: Utc.with_ymd_and_hms(2024, 1, 31, 14, 25, second).unwrap(),
        }
    }

    fn report_event(session: SessionId) -> FleetEvent {
        let origin = ReportOrigin::new("127.0.0.1:7000".parse().unwrap(), Transport::Tcp);
        let mut report = VesselReport::empty(&origin, ReportProtocol::Nmea);
        report.mmsi = Some(367168384);
        FleetEvent::report(&report, 1, Some(session))
    }

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("ais-logs");
        let log = SessionLog::create(&dir, Duration::from_secs(5)).unwrap();
        assert!(dir.is_dir());
        assert!(log.current_path().is_none());
    }

    #[test]
    fn test_session_file_lifecycle() {
        let temp = TempDir::new().unwrap();
        let mut log = SessionLog::create(temp.path(), Duration::from_secs(5)).unwrap();
        let first = session(1, 1);

        log.record(&report_event(first)).unwrap();
        log.record(&report_event(first)).unwrap();
        let path = temp.path().join("ais_log_20240131_142501.log");
        assert_eq!(log.current_path(), Some(path.as_path()));

        log.record(&FleetEvent::inactive(None, 1, Some(first))).unwrap();
        assert!(log.current_path().is_none());

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["data"]["mmsi"], 367168384);
        assert_eq!(lines[0]["data"]["status"], "active");
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(
            lines[2]["event"],
            "No data for 5 seconds, marking inactive"
        );
    }

    #[test]
    fn test_new_session_opens_new_file() {
        let temp = TempDir::new().unwrap();
        let mut log = SessionLog::create(temp.path(), Duration::from_secs(5)).unwrap();

        log.record(&report_event(session(1, 1))).unwrap();
        log.record(&FleetEvent::inactive(None, 1, None)).unwrap();
        log.record(&report_event(session(2, 9))).unwrap();
        log.close();

        assert!(temp.path().join("ais_log_20240131_142501.log").exists());
        let second = temp.path().join("ais_log_20240131_142509.log");
        assert_eq!(read_lines(&second).len(), 1);
    }

    #[test]
    fn test_inactive_without_open_session_is_ignored() {
        let temp = TempDir::new().unwrap();
        let mut log = SessionLog::create(temp.path(), Duration::from_secs(5)).unwrap();
        log.record(&FleetEvent::inactive(None, 0, None)).unwrap();
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
