//! # Port Probe
//!
//! Startup-only classification of an unknown physical port.
//!
//! A probe opens the port, waits for the device to start talking, reads a
//! bounded number of lines and decides from the first non-empty one whether
//! the port carries NMEA traffic. The port is closed on every exit path.
//! Total wall time is bounded by `settle + attempts * read_timeout`, so a
//! missing device cannot stall startup.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::port_trait::{LineTransport, ReadOutcome};
use crate::channel::PhysicalPort;
use crate::config::Config;

/// Start-of-sentence marker every GPS talker line begins with
pub const GPS_MARKER: &[u8; 3] = b"$GP";

/// What a sample line looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    GpsLike,
    Other,
}

/// Result of probing one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    GpsLike,
    Other,
    /// Nothing was read before the attempts ran out (or the port would not open)
    NoData,
}

impl ProbeOutcome {
    pub fn is_gps(&self) -> bool {
        matches!(self, ProbeOutcome::GpsLike)
    }
}

impl From<LineClass> for ProbeOutcome {
    fn from(class: LineClass) -> Self {
        match class {
            LineClass::GpsLike => ProbeOutcome::GpsLike,
            LineClass::Other => ProbeOutcome::Other,
        }
    }
}

/// Classify a sample line by its first three bytes
///
/// Anything shorter than the marker is `Other`.
pub fn classify(sample: &[u8]) -> LineClass {
    if sample.starts_with(GPS_MARKER) {
        LineClass::GpsLike
    } else {
        LineClass::Other
    }
}

/// Probe timing
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    /// Delay after opening before the first read
    pub settle: Duration,
    /// Number of read cycles before giving up
    pub attempts: u32,
    /// Hard cap on a single read
    pub read_timeout: Duration,
}

impl ProbeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            settle: Duration::from_millis(config.probe.settle_ms),
            attempts: config.probe.attempts,
            read_timeout: config.serial.read_timeout(),
        }
    }

    /// Worst-case wall time of one probe
    pub fn budget(&self) -> Duration {
        self.settle + self.read_timeout * self.attempts
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Probe a physical port and classify its traffic
///
/// An open failure or a read error is reported as `NoData`/skipped rather
/// than propagated: probing is best effort.
pub async fn probe(
    transport: &dyn LineTransport,
    port: PhysicalPort,
    settings: &ProbeSettings,
) -> ProbeOutcome {
    let mut source = match transport.open(port).await {
        Ok(source) => source,
        Err(e) => {
            warn!("Probe could not open port {}: {}", port, e);
            return ProbeOutcome::NoData;
        }
    };

    tokio::time::sleep(settings.settle).await;

    let mut outcome = ProbeOutcome::NoData;

    for attempt in 1..=settings.attempts {
        let read = tokio::time::timeout(settings.read_timeout, source.read_line()).await;

        match read {
            Ok(Ok(ReadOutcome::Line(line))) if !line.is_empty() => {
                outcome = classify(&line).into();
                debug!("Probe of port {} read {} bytes on attempt {}", port, line.len(), attempt);
                break;
            }
            Ok(Ok(ReadOutcome::Closed)) => {
                debug!("Port {} closed during probe", port);
                break;
            }
            Ok(Ok(_)) | Err(_) => {
                debug!("Probe of port {}: no data on attempt {}", port, attempt);
            }
            Ok(Err(e)) => {
                warn!("Probe read error on port {}: {}", port, e);
            }
        }
    }

    source.close();
    info!("Probe of port {}: {:?}", port, outcome);
    outcome
}
