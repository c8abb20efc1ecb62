//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{NodeError, Result};
use crate::gps::SpeedUnit;

/// Baud rates accepted for the GPS receivers, modem and microcontroller
const SUPPORTED_BAUD_RATES: [u32; 6] = [4800, 9600, 19200, 38400, 57600, 115200];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub gps: GpsConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Physical port `N` is opened at `<device_prefix>N`
    #[serde(default = "default_device_prefix")]
    pub device_prefix: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Startup port probe configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

/// Durable telemetry log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Period of the composed downlink record
    #[serde(default = "default_downlink_interval_ms")]
    pub downlink_interval_ms: u64,
}

/// GPS record configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GpsConfig {
    #[serde(default)]
    pub speed_unit: SpeedUnit,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device_prefix: default_device_prefix(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            attempts: default_attempts(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            downlink_interval_ms: default_downlink_interval_ms(),
        }
    }
}

// Default value functions
fn default_device_prefix() -> String { "/dev/ttyS".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_read_timeout_ms() -> u64 { 500 }

fn default_settle_ms() -> u64 { 1000 }
fn default_attempts() -> u32 { 4 }

fn default_log_file() -> String { "telemetryLog.txt".to_string() }
fn default_downlink_interval_ms() -> u64 { 1000 }

impl SerialConfig {
    /// Per-read timeout as a `Duration`
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl TelemetryConfig {
    pub fn downlink_interval(&self) -> Duration {
        Duration::from_millis(self.downlink_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use telemetry_node::config::Config;
    ///
    /// let config = Config::load("config/node.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.device_prefix.is_empty() {
            return Err(invalid("serial device_prefix cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 4800, 9600, 19200, 38400, 57600, 115200",
            ));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 10000 {
            return Err(invalid("read_timeout_ms must be between 1 and 10000"));
        }

        if self.probe.settle_ms > 10000 {
            return Err(invalid("settle_ms must be between 0 and 10000"));
        }

        if self.probe.attempts == 0 || self.probe.attempts > 16 {
            return Err(invalid("probe attempts must be between 1 and 16"));
        }

        if self.telemetry.log_file.is_empty() {
            return Err(invalid("telemetry log_file cannot be empty"));
        }

        if self.telemetry.downlink_interval_ms < 100 || self.telemetry.downlink_interval_ms > 60000 {
            return Err(invalid("downlink_interval_ms must be between 100 and 60000"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> NodeError {
    NodeError::Config(toml::de::Error::custom(msg))
}
