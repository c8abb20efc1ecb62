//! # Error Types
//!
//! Custom error types for the telemetry node using `thiserror`.

use thiserror::Error;

/// Main error type for the telemetry node
#[derive(Debug, Error)]
pub enum NodeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial transport errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// No serial device answered at the requested path
    #[error("Serial port not found: {0}")]
    SerialPortNotFound(String),

    /// Durable telemetry log could not be written
    #[error("Telemetry log error: {0}")]
    TelemetryLog(String),

    /// Command text does not fit the command buffer
    #[error("Command too long: {len} bytes (capacity {capacity})")]
    CommandTooLong { len: usize, capacity: usize },

    /// Command text is not valid UTF-8
    #[error("Command is not valid UTF-8")]
    CommandEncoding,

    /// Sensor sample has the wrong shape or an unparsable field
    #[error("Malformed sensor sample: {0}")]
    SensorSample(String),
}

/// Result type alias for the telemetry node
pub type Result<T> = std::result::Result<T, NodeError>;
