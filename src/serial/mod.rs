//! # Serial Communication Module
//!
//! Handles the node's four UARTs (two GPS receivers, the radio modem and the
//! secondary microcontroller).
//!
//! This module handles:
//! - Opening a physical port at the configured baud rate (8N1)
//! - Reading `\n`-terminated lines with a per-read timeout
//! - Probing unknown ports at startup to tell GPS traffic from the rest
//! - Binding physical ports to logical channels

pub mod binder;
pub mod port_trait;
pub mod probe;

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::channel::PhysicalPort;
use crate::config::SerialConfig;
use crate::error::{NodeError, Result};
pub use port_trait::{LineSource, LineTransport, ReadOutcome};

/// Transport over real UARTs via `tokio-serial`
#[derive(Debug, Clone)]
pub struct SerialTransport {
    device_prefix: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Create a transport from the serial configuration section
    pub fn new(config: &SerialConfig) -> Self {
        Self {
            device_prefix: config.device_prefix.clone(),
            baud_rate: config.baud_rate,
            read_timeout: config.read_timeout(),
        }
    }

    /// Device path a physical port maps to
    pub fn device_path(&self, port: PhysicalPort) -> String {
        port.device_path(&self.device_prefix)
    }

    /// Open a specific serial device with 8N1 settings
    fn open_port(&self, path: &str) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| match e.kind {
                tokio_serial::ErrorKind::NoDevice => NodeError::SerialPortNotFound(path.to_string()),
                _ => NodeError::Serial(format!("Failed to open {}: {}", path, e)),
            })?;

        Ok(port)
    }
}

#[async_trait]
impl LineTransport for SerialTransport {
    async fn open(&self, port: PhysicalPort) -> Result<Box<dyn LineSource>> {
        let path = self.device_path(port);
        debug!("Opening serial port {}", path);

        let stream = self.open_port(&path)?;
        info!("Opened {} at {} baud", path, self.baud_rate);

        Ok(Box::new(SerialLineSource {
            reader: BufReader::new(stream),
            pending: Vec::new(),
            read_timeout: self.read_timeout,
            path,
        }))
    }
}

/// Line reader over one open serial device
pub struct SerialLineSource {
    reader: BufReader<tokio_serial::SerialStream>,
    /// Bytes of a line still being received; survives a read timeout
    pending: Vec<u8>,
    read_timeout: Duration,
    path: String,
}

impl std::fmt::Debug for SerialLineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLineSource")
            .field("path", &self.path)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LineSource for SerialLineSource {
    async fn read_line(&mut self) -> io::Result<ReadOutcome> {
        let read = self.reader.read_until(b'\n', &mut self.pending);
        let outcome = tokio::time::timeout(self.read_timeout, read).await;

        match outcome {
            Err(_elapsed) => Ok(ReadOutcome::Timeout),
            Ok(Ok(0)) if self.pending.is_empty() => Ok(ReadOutcome::Closed),
            Ok(Ok(_)) => Ok(ReadOutcome::Line(std::mem::take(&mut self.pending))),
            Ok(Err(e)) => Err(e),
        }
    }

    fn close(self: Box<Self>) {
        debug!("Closing serial port {}", self.path);
    }
}

/// Decide whether a received line is well-formed text
///
/// Lines made only of printable ASCII and whitespace go to a channel's
/// valid-line handler; anything else (line noise, baud mismatch garbage)
/// goes to the invalid-line handler.
pub fn is_clean_line(line: &[u8]) -> bool {
    !line.is_empty()
        && line
            .iter()
            .all(|&b| b.is_ascii_graphic() || b.is_ascii_whitespace())
}
