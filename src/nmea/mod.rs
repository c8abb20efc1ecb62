//! # NMEA Sentence Parser
//!
//! Turns raw NMEA 0183 sentences into GPS fixes.
//!
//! Receivers report a fix across several sentence types, so the parser keeps
//! a running fix and merges each sentence into it:
//!
//! | Sentence | Updates                                             |
//! |----------|-----------------------------------------------------|
//! | `RMC`    | position, speed (knots), heading, fix flag (`A`/`V`) |
//! | `GGA`    | position, fix flag (quality > 0), satellites, altitude |
//!
//! ```text
//! $GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A
//!        time   st latitude   longitude  speed course date
//! ```
//!
//! Both `GP` (GPS) and `GN` (multi-constellation) talkers are accepted.

use crate::checksum::{trim_line_end, verify_nmea};

/// Snapshot of the receiver's fix after one sentence
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpsFix {
    /// Decimal degrees, south negative
    pub latitude: f64,
    /// Decimal degrees, west negative
    pub longitude: f64,
    /// Metres above mean sea level
    pub altitude: f64,
    /// Ground speed in knots
    pub speed_knots: f64,
    /// Course over ground in degrees
    pub heading: f64,
    pub fix: bool,
    pub satellites: u32,
}

/// Turns one raw sentence into a fix
pub trait SentenceParser: Send {
    /// Parse a sentence; `None` when it is malformed or carries no fix data
    fn parse(&mut self, sentence: &[u8]) -> Option<GpsFix>;
}

/// Parser for RMC and GGA sentences that accumulates a running fix
#[derive(Debug, Clone, Default)]
pub struct NmeaParser {
    current: GpsFix,
}

impl NmeaParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_rmc(&mut self, fields: &[&str]) -> Option<()> {
        // $xxRMC,time,status,lat,N/S,lon,E/W,speed,course,date,...
        if fields.len() < 10 {
            return None;
        }

        let mut next = self.current;
        next.fix = fields[2] == "A";
        update_position(&mut next.latitude, fields[3], fields[4])?;
        update_position(&mut next.longitude, fields[5], fields[6])?;
        update_number(&mut next.speed_knots, fields[7])?;
        update_number(&mut next.heading, fields[8])?;

        self.current = next;
        Some(())
    }

    fn apply_gga(&mut self, fields: &[&str]) -> Option<()> {
        // $xxGGA,time,lat,N/S,lon,E/W,quality,satellites,hdop,altitude,M,...
        if fields.len() < 10 {
            return None;
        }

        let mut next = self.current;
        update_position(&mut next.latitude, fields[2], fields[3])?;
        update_position(&mut next.longitude, fields[4], fields[5])?;

        let mut quality = 0u32;
        update_number(&mut quality, fields[6])?;
        next.fix = quality > 0;

        update_number(&mut next.satellites, fields[7])?;
        update_number(&mut next.altitude, fields[9])?;

        self.current = next;
        Some(())
    }
}

impl SentenceParser for NmeaParser {
    fn parse(&mut self, sentence: &[u8]) -> Option<GpsFix> {
        if !verify_nmea(sentence) {
            return None;
        }

        let sentence = std::str::from_utf8(trim_line_end(sentence)).ok()?;
        let body = &sentence[..sentence.rfind('*')?];
        let fields: Vec<&str> = body.split(',').collect();

        match fields[0] {
            "$GPRMC" | "$GNRMC" => self.apply_rmc(&fields)?,
            "$GPGGA" | "$GNGGA" => self.apply_gga(&fields)?,
            _ => return None,
        }

        Some(self.current)
    }
}

/// Overwrite `target` with a parsed field; an empty field keeps the old value
fn update_number<T: std::str::FromStr>(target: &mut T, field: &str) -> Option<()> {
    if !field.is_empty() {
        *target = field.parse().ok()?;
    }
    Some(())
}

/// Overwrite `target` with a `ddmm.mmmm` coordinate; an empty field keeps the
/// old value
fn update_position(target: &mut f64, value: &str, hemisphere: &str) -> Option<()> {
    if !value.is_empty() {
        *target = to_degrees(value, hemisphere)?;
    }
    Some(())
}

/// Convert NMEA `(d)ddmm.mmmm` plus hemisphere to signed decimal degrees
///
/// # Examples
///
/// ```
/// use telemetry_node::nmea::to_degrees;
///
/// let lat = to_degrees("4807.038", "N").unwrap();
/// assert!((lat - 48.1173).abs() < 1e-9);
/// assert!(to_degrees("01131.000", "W").unwrap() < 0.0);
/// ```
pub fn to_degrees(value: &str, hemisphere: &str) -> Option<f64> {
    if !value.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }

    let dot = value.find('.').unwrap_or(value.len());
    if dot < 3 {
        return None;
    }

    let (degrees, minutes) = value.split_at(dot - 2);
    let degrees: f64 = degrees.parse().ok()?;
    let minutes: f64 = minutes.parse().ok()?;
    let magnitude = degrees + minutes / 60.0;

    if hemisphere.eq_ignore_ascii_case("S") || hemisphere.eq_ignore_ascii_case("W") {
        Some(-magnitude)
    } else {
        Some(magnitude)
    }
}
