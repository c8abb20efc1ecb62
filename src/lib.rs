//! # Telemetry Node Library
//!
//! Flight computer for a high-altitude balloon payload.
//!
//! The node listens on four UARTs: two GPS receivers, a radio modem carrying
//! ground-station commands, and a secondary microcontroller streaming sensor
//! samples. Every line received is appended to a shared telemetry log, then
//! handled according to the channel it arrived on.

pub mod channel;
pub mod checksum;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gps;
pub mod nmea;
pub mod sensor;
pub mod serial;
pub mod telemetry;
