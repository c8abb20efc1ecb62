//! # Telemetry Module
//!
//! Durable, append-only telemetry log shared by every channel.
//!
//! This module handles:
//! - Creating the log file and writing an `INIT` line on every start
//! - Timestamping records with millisecond UTC ISO-8601 timestamps
//! - Serializing appends from concurrently running channels
//!
//! Each record is one line: `<source-tag>,<timestamp>,<raw payload>`.
//! A write failure never stops the node: the record is dropped and a
//! warning goes to the operator console.

use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{NodeError, Result};

pub mod downlink;

/// Line written on every process start
pub const INIT_LINE: &str = "INIT,Logfile Initialized,INIT\n";

/// Timestamp as written to the log, e.g. `2016-06-18T14:03:07.250Z`
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// One telemetry log record
///
/// The payload is kept as received; garbled serial bytes reach the file
/// unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// Create a record stamped with the current time
    pub fn now(source: &str, payload: &[u8]) -> Self {
        Self {
            source: source.to_string(),
            timestamp: Utc::now(),
            payload: payload.to_vec(),
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    /// Bytes of the log line: `tag,timestamp,` then the raw payload, with a
    /// `\n` added when the payload has none
    pub fn to_bytes(&self) -> Vec<u8> {
        let prefix = format!("{},{},", self.source, self.formatted_timestamp());
        let mut line = Vec::with_capacity(prefix.len() + self.payload.len() + 1);
        line.extend_from_slice(prefix.as_bytes());
        line.extend_from_slice(&self.payload);
        if !self.payload.ends_with(b"\n") {
            line.push(b'\n');
        }
        line
    }
}

/// Append-only telemetry log file
#[derive(Debug)]
pub struct TelemetryLog {
    path: PathBuf,
    /// Held for the whole open/write/flush/close of one record
    write_lock: Mutex<()>,
}

impl TelemetryLog {
    /// Open (creating if absent) the log and append the `INIT` line
    ///
    /// Failure to write the `INIT` line is reported but not fatal.
    pub fn initialize<P: Into<PathBuf>>(path: P) -> Self {
        let log = Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        };

        let existed = log.path.exists();
        match log.write_raw(INIT_LINE.as_bytes()) {
            Ok(()) if existed => info!("Appending to telemetry log {}", log.path.display()),
            Ok(()) => info!("Created telemetry log {}", log.path.display()),
            Err(e) => warn!("Couldn't initialize telemetry log {}: {}", log.path.display(), e),
        }

        log
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record
    ///
    /// # Errors
    ///
    /// Returns `TelemetryLog` if the file cannot be opened or written.
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        self.write_raw(&record.to_bytes())
    }

    /// Append a record for `payload` under `source`, reporting failures to the
    /// console instead of the caller
    ///
    /// Blocks on file I/O; async callers use [`TelemetryLog::record_async`].
    pub fn record(&self, source: &str, payload: &[u8]) {
        let record = LogRecord::now(source, payload);
        if let Err(e) = self.append(&record) {
            warn!("Dropped telemetry record from {}: {}", source, e);
        } else {
            debug!("Logged {} record ({} bytes)", source, payload.len());
        }
    }

    /// [`TelemetryLog::record`] on tokio's blocking pool
    ///
    /// Completes once the record is on disk, so records awaited in sequence
    /// keep their order.
    pub async fn record_async(self: Arc<Self>, source: &'static str, payload: Vec<u8>) {
        let written = tokio::task::spawn_blocking(move || self.record(source, &payload)).await;
        if let Err(e) = written {
            warn!("Telemetry writer for {} failed: {}", source, e);
        }
    }

    fn write_raw(&self, line: &[u8]) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| NodeError::TelemetryLog("log writer lock poisoned".to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                NodeError::TelemetryLog(format!("Couldn't open {} for appending: {}", self.path.display(), e))
            })?;

        file.write_all(line)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_initialize_creates_file_with_init_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telemetryLog.txt");

        let log = TelemetryLog::initialize(&path);

        assert_eq!(log.path(), path.as_path());
        assert_eq!(read(&path), INIT_LINE);
    }

    #[test]
    fn test_initialize_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telemetryLog.txt");
        std::fs::write(&path, "GP1,2016-06-18T14:03:07.250Z,$GPRMC\n").unwrap();

        TelemetryLog::initialize(&path);

        assert_eq!(read(&path), format!("GP1,2016-06-18T14:03:07.250Z,$GPRMC\n{}", INIT_LINE));
    }

    #[test]
    fn test_initialize_twice_appends_two_init_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telemetryLog.txt");

        TelemetryLog::initialize(&path);
        TelemetryLog::initialize(&path);

        assert_eq!(read(&path).matches("INIT,Logfile Initialized,INIT").count(), 2);
    }

    #[test]
    fn test_record_format() {
        let record = LogRecord {
            source: "RADIO".to_string(),
            timestamp: Utc.with_ymd_and_hms(2016, 6, 18, 14, 3, 7).unwrap()
                + chrono::Duration::milliseconds(250),
            payload: b"U,Hello balloon,*7C\n".to_vec(),
        };

        assert_eq!(record.formatted_timestamp(), "2016-06-18T14:03:07.250Z");
        assert_eq!(
            record.to_bytes(),
            b"RADIO,2016-06-18T14:03:07.250Z,U,Hello balloon,*7C\n".to_vec()
        );
    }

    #[test]
    fn test_record_without_newline_is_terminated() {
        let record = LogRecord::now("InitDevices", b"GPS1-3, Radio-2");
        let line = String::from_utf8(record.to_bytes()).unwrap();
        assert!(line.starts_with("InitDevices,"));
        assert!(line.ends_with(",GPS1-3, Radio-2\n"));
    }

    #[test]
    fn test_append_writes_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telemetryLog.txt");
        let log = TelemetryLog::initialize(&path);

        log.record("GP1", b"$GPGGA,123519*47\r\n");
        log.record("MC2", b"21.5,40.1");

        let contents = read(&path);
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("GP1,"));
        assert!(lines[1].ends_with(",$GPGGA,123519*47"));
        assert!(lines[2].starts_with("MC2,"));
        assert!(lines[2].ends_with(",21.5,40.1"));
    }

    #[test]
    fn test_unwritable_log_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing_dir").join("telemetryLog.txt");

        let log = TelemetryLog::initialize(&path);
        log.record("GP1", b"$GPRMC\n");

        assert!(log.append(&LogRecord::now("GP1", b"$GPRMC\n")).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telemetryLog.txt");
        let log = Arc::new(TelemetryLog::initialize(&path));

        let handles: Vec<_> = ["GP1", "GP2", "RADIO", "MC2"]
            .into_iter()
            .map(|tag| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.record(tag, format!("{}-payload-{}-{}\n", tag, i, "x".repeat(200)).as_bytes());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = read(&path);
        let records: Vec<&str> = contents.lines().skip(1).collect();
        assert_eq!(records.len(), 200);
        for line in records {
            let tag = line.split(',').next().unwrap();
            assert!(line.contains(&format!(",{}-payload-", tag)), "interleaved record: {}", line);
            assert!(line.ends_with(&"x".repeat(200)));
        }
    }

    #[test]
    fn test_non_utf8_payload_written_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telemetryLog.txt");
        let log = TelemetryLog::initialize(&path);

        log.record("GP1-Invalid", b"$GP\xB5\xFE\n");

        let contents = std::fs::read(&path).unwrap();
        assert!(contents.ends_with(b",$GP\xB5\xFE\n"));
        assert_eq!(contents.iter().filter(|&&b| b == b'\n').count(), 2);
    }

    #[tokio::test]
    async fn test_record_async_keeps_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telemetryLog.txt");
        let log = Arc::new(TelemetryLog::initialize(&path));

        for i in 0..20 {
            Arc::clone(&log)
                .record_async("RADIO", format!("line {}\n", i).into_bytes())
                .await;
        }

        let contents = read(&path);
        let payloads: Vec<&str> = contents
            .lines()
            .skip(1)
            .map(|line| line.rsplit(',').next().unwrap())
            .collect();
        let expected: Vec<String> = (0..20).map(|i| format!("line {}", i)).collect();
        assert_eq!(payloads, expected);
    }
}
