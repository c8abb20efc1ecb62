//! # GPS Processor
//!
//! Applies the node's fix policy to parsed GPS fixes and publishes the result.
//!
//! ## Speed
//!
//! Receivers report ground speed in knots. It is converted to the configured
//! display unit, and anything below 1.0 is reported as 0.1 so that jitter
//! while stationary never reads as a hard stop.
//!
//! ## Altitude
//!
//! Altitude is only trusted with a valid fix and a positive value; otherwise
//! it is published as [`Altitude::Invalid`] rather than zero or a stale value.
//!
//! ## Canonical record
//!
//! ```text
//! lat(%7.5f),lon(%7.5f),alt(%3.1f),speed(%3.1f),heading(%3.1f),fix(%d),sats(%d)
//! 48.11730,11.51667,150.0,3.7,84.4,1,8
//! ```

use serde::Deserialize;
use std::fmt;
use std::sync::RwLock;

use crate::nmea::GpsFix;

/// Miles per hour in one knot
pub const MPH_PER_KNOT: f64 = 1.150779448023543;

/// Kilometres per hour in one knot
pub const KPH_PER_KNOT: f64 = 1.852;

/// Speeds below this are treated as GPS jitter
pub const SPEED_FLOOR: f64 = 1.0;

/// Speed reported in place of anything below [`SPEED_FLOOR`]
pub const SPEED_FLOOR_VALUE: f64 = 0.1;

/// Numeric value written for an untrusted altitude
pub const GPS_ALTITUDE_INVALID: f64 = -1.0;

/// Sentence types the processor accepts
pub const ACCEPTED_PREFIXES: [&str; 2] = ["$GPRMC", "$GPGGA"];

/// Display unit for ground speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedUnit {
    #[default]
    Kph,
    Mph,
}

impl SpeedUnit {
    /// Conversion factor from knots
    pub fn per_knot(&self) -> f64 {
        match self {
            SpeedUnit::Kph => KPH_PER_KNOT,
            SpeedUnit::Mph => MPH_PER_KNOT,
        }
    }

    pub fn from_knots(&self, knots: f64) -> f64 {
        knots * self.per_knot()
    }
}

/// Convert and floor a raw ground speed
///
/// # Examples
///
/// ```
/// use telemetry_node::gps::{display_speed, SpeedUnit};
///
/// assert_eq!(display_speed(0.5, SpeedUnit::Kph), 0.1);
/// assert!((display_speed(10.0, SpeedUnit::Kph) - 18.52).abs() < 1e-9);
/// ```
pub fn display_speed(knots: f64, unit: SpeedUnit) -> f64 {
    let speed = unit.from_knots(knots);
    if speed < SPEED_FLOOR {
        SPEED_FLOOR_VALUE
    } else {
        speed
    }
}

/// Altitude after the fix-quality gate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Altitude {
    Valid(f64),
    #[default]
    Invalid,
}

impl Altitude {
    /// Gate a raw altitude on fix quality and sign
    pub fn gate(fix: bool, altitude: f64) -> Self {
        if fix && altitude > 0.0 {
            Altitude::Valid(altitude)
        } else {
            Altitude::Invalid
        }
    }

    /// Numeric form, [`GPS_ALTITUDE_INVALID`] when untrusted
    pub fn as_f64(&self) -> f64 {
        match self {
            Altitude::Valid(metres) => *metres,
            Altitude::Invalid => GPS_ALTITUDE_INVALID,
        }
    }
}

/// Fix after unit conversion and gating
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsReport {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Altitude,
    pub speed: f64,
    pub heading: f64,
    pub fix: bool,
    pub satellites: u32,
}

impl GpsReport {
    /// Apply the speed and altitude policy to a parsed fix
    pub fn from_fix(fix: &GpsFix, unit: SpeedUnit) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: Altitude::gate(fix.fix, fix.altitude),
            speed: display_speed(fix.speed_knots, unit),
            heading: fix.heading,
            fix: fix.fix,
            satellites: fix.satellites,
        }
    }

    /// Canonical comma-separated record
    pub fn record(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GpsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:7.5},{:7.5},{:3.1},{:3.1},{:3.1},{},{}",
            self.latitude,
            self.longitude,
            self.altitude.as_f64(),
            self.speed,
            self.heading,
            u8::from(self.fix),
            self.satellites
        )
    }
}

/// Is this line one of the sentence types the processor handles?
pub fn is_accepted_sentence(line: &[u8]) -> bool {
    ACCEPTED_PREFIXES
        .iter()
        .any(|prefix| line.starts_with(prefix.as_bytes()))
}

/// Last published fix of one GPS channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixSnapshot {
    pub latitude: f64,
    pub altitude: Altitude,
    pub fix: bool,
    pub record: String,
}

impl From<&GpsReport> for FixSnapshot {
    fn from(report: &GpsReport) -> Self {
        Self {
            latitude: report.latitude,
            altitude: report.altitude,
            fix: report.fix,
            record: report.record(),
        }
    }
}

/// Guarded, single-writer fix state shared with any reader
///
/// Only the owning GPS channel publishes; readers take snapshots.
#[derive(Debug, Default)]
pub struct FixState {
    inner: RwLock<Option<FixSnapshot>>,
}

impl FixState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published fix
    pub fn publish(&self, report: &GpsReport) {
        let snapshot = FixSnapshot::from(report);
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
        }
    }

    /// Latest published fix, if any
    pub fn snapshot(&self) -> Option<FixSnapshot> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
