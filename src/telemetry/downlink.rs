//! # Downlink Record
//!
//! Periodic status line combining the latest GPS fix and sensor sample,
//! signed with the same `,*HH` check value the ground station uses for
//! uplinked commands.
//!
//! ```text
//! $:<timestamp>,<lat>,<lon>,<alt>,<speed>,<heading>,<fix>,<sats>,
//!   <atm temp>,<humidity>,<pressure>,<sensor alt>,<lin accel x>,<y>,<z>,
//!   <imu heading>,<pitch>,<roll>,<sound dB>,<voltage>,<current>,*HH
//! ```
//!
//! The GPS fields are the canonical GPS record. Before any fix or sample has
//! been published, their fields report a zero fix and a zeroed sample.

use chrono::{DateTime, Utc};

use super::format_timestamp;
use crate::checksum::with_check_value;
use crate::gps::{GpsReport, SpeedUnit};
use crate::nmea::GpsFix;
use crate::sensor::SensorSample;

/// Log tag for downlink records
pub const DOWNLINK_LOG_TAG: &str = "DOWNLINK";

/// Marker opening every downlink record
pub const DOWNLINK_PREFIX: &str = "$:";

/// GPS fields used until a fix has been published
pub fn no_fix_record() -> String {
    GpsReport::from_fix(&GpsFix::default(), SpeedUnit::default()).record()
}

/// Build one signed downlink record
pub fn compose(timestamp: &DateTime<Utc>, gps_record: &str, sample: &SensorSample) -> String {
    let payload = format!(
        "{}{},{},{:.1},{:.1},{:.1},{:.1},{:.2},{:.2},{:.2},{:.1},{:.1},{:.1},{:.1},{:.1},{}",
        DOWNLINK_PREFIX,
        format_timestamp(timestamp),
        gps_record,
        sample.atm_temp,
        sample.atm_humidity,
        sample.atm_pressure,
        sample.altitude_m,
        sample.imu_linear_accel.x,
        sample.imu_linear_accel.y,
        sample.imu_linear_accel.z,
        sample.imu_heading,
        sample.imu_pitch,
        sample.imu_roll,
        sample.sound_level_db(),
        sample.device_voltage,
        sample.device_current,
    );
    with_check_value(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::command_boundary;
    use crate::sensor::Vector3;
    use chrono::TimeZone;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 6, 18, 14, 3, 7).unwrap() + chrono::Duration::milliseconds(250)
    }

    fn sample() -> SensorSample {
        SensorSample {
            atm_temp: 21.5,
            atm_humidity: 40.1,
            atm_pressure: 1013.2,
            imu_linear_accel: Vector3 { x: 0.01, y: 0.02, z: 9.81 },
            imu_heading: 270.0,
            imu_pitch: 1.5,
            imu_roll: -2.5,
            sound_amplitude: 10.5,
            device_voltage: 7.4,
            device_current: 120,
            altitude_m: 152.3,
            ..SensorSample::default()
        }
    }

    #[test]
    fn test_compose_layout() {
        let record = compose(&timestamp(), "48.11730,11.51667,150.0,3.7,84.4,1,8", &sample());

        let payload = "$:2016-06-18T14:03:07.250Z,48.11730,11.51667,150.0,3.7,84.4,1,8,\
                       21.5,40.1,1013.2,152.3,0.01,0.02,9.81,270.0,1.5,-2.5,67.5,7.4,120";
        assert!(record.starts_with(payload));
        assert_eq!(record.len(), payload.len() + 4);
    }

    #[test]
    fn test_compose_is_signed() {
        let record = compose(&timestamp(), &no_fix_record(), &SensorSample::default());
        assert_eq!(command_boundary(record.as_bytes()), Some(record.len() - 4));
    }

    #[test]
    fn test_no_fix_record() {
        assert_eq!(no_fix_record(), "0.00000,0.00000,-1.0,0.1,0.0,0,0");
    }
}
