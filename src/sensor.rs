//! # Sensor Feed
//!
//! The secondary microcontroller streams one comma-separated sample per line
//! with 25 fields, in this order:
//!
//! ```text
//! atm temp, atm humidity, atm pressure,
//! imu lin accel x, y, z, imu heading, pitch, roll,
//! sound amplitude, device voltage, device current (integer),
//! accel x, y, z, mag x, y, z, gyro x, y, z, gravity x, y, z,
//! sensor altitude (m)
//! ```
//!
//! Sound amplitude is a raw board reading; [`decibel_level`] maps it to sound
//! pressure through the microphone's calibration table.

use std::str::FromStr;
use std::sync::RwLock;

use crate::checksum::trim_line_end;
use crate::error::{NodeError, Result};

/// Fields in one sample line
pub const SENSOR_FIELD_COUNT: usize = 25;

/// Board readings of the sound calibration table, ascending
const SOUND_BOARD_VALUES: [f64; 20] = [
    9.0, 12.0, 14.0, 18.0, 24.0, 28.0, 35.0, 56.0, 60.0, 93.0, 100.0, 149.0, 180.0, 200.0, 275.0,
    340.0, 375.0, 419.0, 440.0, 460.0,
];

/// Sound pressure in dB at each board reading
const SOUND_DECIBEL_VALUES: [f64; 20] = [
    58.0, 77.0, 80.0, 85.0, 86.0, 88.0, 90.0, 93.0, 95.0, 100.0, 102.0, 103.0, 105.0, 107.0, 109.0,
    111.0, 113.0, 116.0, 120.0, 125.0,
];

/// Reported for readings above the calibration table
pub const DECIBEL_CEILING: f64 = 130.0;

/// Convert a raw sound amplitude to dB by linear interpolation over the
/// calibration table
///
/// Readings at or below the first entry report the table's floor (58 dB),
/// readings above the last entry report [`DECIBEL_CEILING`].
///
/// # Examples
///
/// ```
/// use telemetry_node::sensor::decibel_level;
///
/// assert_eq!(decibel_level(5.0), 58.0);
/// assert_eq!(decibel_level(10.5), 67.5);
/// assert_eq!(decibel_level(500.0), 130.0);
/// ```
pub fn decibel_level(amplitude: f64) -> f64 {
    let last = SOUND_BOARD_VALUES.len() - 1;

    if amplitude > SOUND_BOARD_VALUES[last] {
        return DECIBEL_CEILING;
    }
    if amplitude.is_nan() || amplitude <= SOUND_BOARD_VALUES[0] {
        return SOUND_DECIBEL_VALUES[0];
    }

    // First table entry at or above the reading; never index 0 here
    let upper = match SOUND_BOARD_VALUES.iter().position(|&board| amplitude <= board) {
        Some(index) => index,
        None => return SOUND_DECIBEL_VALUES[last],
    };
    let lower = upper - 1;

    let fraction = (amplitude - SOUND_BOARD_VALUES[lower])
        / (SOUND_BOARD_VALUES[upper] - SOUND_BOARD_VALUES[lower]);
    SOUND_DECIBEL_VALUES[lower] + fraction * (SOUND_DECIBEL_VALUES[upper] - SOUND_DECIBEL_VALUES[lower])
}

/// Three-axis reading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One sample from the microcontroller
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSample {
    pub atm_temp: f64,
    pub atm_humidity: f64,
    pub atm_pressure: f64,
    pub imu_linear_accel: Vector3,
    pub imu_heading: f64,
    pub imu_pitch: f64,
    pub imu_roll: f64,
    pub sound_amplitude: f64,
    pub device_voltage: f64,
    pub device_current: i32,
    pub accel: Vector3,
    pub mag: Vector3,
    pub gyro: Vector3,
    pub gravity: Vector3,
    pub altitude_m: f64,
}

/// Cursor over the sample's fields
struct Fields<'a> {
    iter: std::iter::Enumerate<std::str::Split<'a, char>>,
}

impl<'a> Fields<'a> {
    fn field<T: FromStr>(&mut self) -> Result<T> {
        let (index, field) = self
            .iter
            .next()
            .ok_or_else(|| NodeError::SensorSample("missing field".to_string()))?;
        field
            .trim()
            .parse()
            .map_err(|_| NodeError::SensorSample(format!("field {} unparsable: {:?}", index, field)))
    }

    fn vector(&mut self) -> Result<Vector3> {
        Ok(Vector3 {
            x: self.field()?,
            y: self.field()?,
            z: self.field()?,
        })
    }
}

impl SensorSample {
    /// Parse one sample line (terminator optional)
    ///
    /// # Errors
    ///
    /// `SensorSample` when the field count is not 25 or a field does not parse.
    pub fn parse(line: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(trim_line_end(line))
            .map_err(|_| NodeError::SensorSample("not UTF-8".to_string()))?;

        let count = text.split(',').count();
        if count != SENSOR_FIELD_COUNT {
            return Err(NodeError::SensorSample(format!(
                "expected {} fields, got {}",
                SENSOR_FIELD_COUNT, count
            )));
        }

        let mut fields = Fields {
            iter: text.split(',').enumerate(),
        };

        Ok(Self {
            atm_temp: fields.field()?,
            atm_humidity: fields.field()?,
            atm_pressure: fields.field()?,
            imu_linear_accel: fields.vector()?,
            imu_heading: fields.field()?,
            imu_pitch: fields.field()?,
            imu_roll: fields.field()?,
            sound_amplitude: fields.field()?,
            device_voltage: fields.field()?,
            device_current: fields.field()?,
            accel: fields.vector()?,
            mag: fields.vector()?,
            gyro: fields.vector()?,
            gravity: fields.vector()?,
            altitude_m: fields.field()?,
        })
    }

    /// Sound pressure of this sample in dB
    pub fn sound_level_db(&self) -> f64 {
        decibel_level(self.sound_amplitude)
    }
}

/// Latest sensor sample, guarded for concurrent readers
#[derive(Debug, Default)]
pub struct SensorState {
    latest: RwLock<Option<SensorSample>>,
}

impl SensorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, sample: SensorSample) {
        match self.latest.write() {
            Ok(mut guard) => *guard = Some(sample),
            Err(poisoned) => *poisoned.into_inner() = Some(sample),
        }
    }

    pub fn latest(&self) -> Option<SensorSample> {
        match self.latest.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "21.5,40.1,1013.2,0.01,0.02,9.81,270.0,1.5,-2.5,0.3,7.4,120,\
                          0.1,0.2,9.8,30.0,-12.0,44.0,0.5,0.6,0.7,0.0,0.0,9.81,152.3\r\n";

    #[test]
    fn test_parse_sample() {
        let sample = SensorSample::parse(SAMPLE.as_bytes()).unwrap();

        assert_eq!(sample.atm_temp, 21.5);
        assert_eq!(sample.atm_pressure, 1013.2);
        assert_eq!(sample.imu_linear_accel, Vector3 { x: 0.01, y: 0.02, z: 9.81 });
        assert_eq!(sample.imu_roll, -2.5);
        assert_eq!(sample.device_current, 120);
        assert_eq!(sample.mag, Vector3 { x: 30.0, y: -12.0, z: 44.0 });
        assert_eq!(sample.gravity.z, 9.81);
        assert_eq!(sample.altitude_m, 152.3);
    }

    #[test]
    fn test_wrong_field_count() {
        assert!(matches!(
            SensorSample::parse(b"21.5,40.1,1013.2\n"),
            Err(NodeError::SensorSample(_))
        ));
    }

    #[test]
    fn test_unparsable_field() {
        let line = SAMPLE.replace("120", "1.2e");
        assert!(SensorSample::parse(line.as_bytes()).is_err());
    }

    #[test]
    fn test_integer_current_rejects_decimal() {
        let line = SAMPLE.replace(",120,", ",120.5,");
        assert!(SensorSample::parse(line.as_bytes()).is_err());
    }

    #[test]
    fn test_sensor_state() {
        let state = SensorState::new();
        assert!(state.latest().is_none());

        let sample = SensorSample::parse(SAMPLE.as_bytes()).unwrap();
        state.publish(sample);
        assert_eq!(state.latest(), Some(sample));
    }

    #[test]
    fn test_decibel_table_edges() {
        assert_eq!(decibel_level(0.0), 58.0);
        assert_eq!(decibel_level(9.0), 58.0);
        assert_eq!(decibel_level(460.0), 125.0);
        assert_eq!(decibel_level(460.5), DECIBEL_CEILING);
        assert_eq!(decibel_level(f64::NAN), 58.0);
    }

    #[test]
    fn test_decibel_interpolation() {
        assert_eq!(decibel_level(12.0), 77.0);
        assert_eq!(decibel_level(93.0), 100.0);
        assert!((decibel_level(10.5) - 67.5).abs() < 1e-9);
        // Halfway between 200 (107 dB) and 275 (109 dB)
        assert!((decibel_level(237.5) - 108.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_sound_level() {
        let sample = SensorSample {
            sound_amplitude: 419.0,
            ..SensorSample::default()
        };
        assert_eq!(sample.sound_level_db(), 116.0);
    }
}
