//! Trait abstraction for line-oriented serial transport to enable testing

use async_trait::async_trait;
use std::io;

use crate::channel::PhysicalPort;
use crate::error::Result;

/// Result of one blocking line read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line, terminator included when the device sent one
    Line(Vec<u8>),
    /// Nothing arrived within the read timeout
    Timeout,
    /// The device went away (EOF)
    Closed,
}

/// Opens physical ports
#[async_trait]
pub trait LineTransport: Send + Sync {
    /// Open a physical port for line reading
    async fn open(&self, port: PhysicalPort) -> Result<Box<dyn LineSource>>;
}

/// An open port that yields lines
#[async_trait]
pub trait LineSource: Send {
    /// Read the next line, waiting at most the transport's read timeout
    async fn read_line(&mut self) -> io::Result<ReadOutcome>;

    /// Close the port. Consumes the source so a port closes exactly once.
    fn close(self: Box<Self>);
}
