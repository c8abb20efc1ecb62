//! # Command Module
//!
//! Validation and execution of commands uplinked over the radio modem.
//!
//! A command line looks like `U,Hello balloon,*7C`: the payload, then a
//! `,*HH` check value. The validator strips the line terminator, asks a
//! [`BoundaryLocator`] where the check value starts, and forwards only the
//! payload before that boundary. Lines that fail validation are dropped
//! whole; nothing is executed on a best-effort basis.
//!
//! Commands are identified by their first character:
//!
//! | Command | Meaning                                  |
//! |---------|------------------------------------------|
//! | `R`     | Reset for a new run                      |
//! | `U,...` | User message for the on-board display    |

pub mod display;

use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::checksum::command_boundary;
use crate::error::{NodeError, Result};

/// Exclusive upper bound for an accepted checksum boundary
pub const MAX_BOUNDARY: usize = 256;

/// Capacity of the command buffer in bytes
pub const COMMAND_CAPACITY: usize = 256;

/// Pending user messages kept for the display
pub const DISPLAY_QUEUE_CAPACITY: usize = 16;

/// Finds the checksum boundary of a command line
#[cfg_attr(test, automock)]
pub trait BoundaryLocator: Send + Sync {
    /// Offset where the check value starts, `None` if the line fails validation
    fn boundary_of(&self, line: &[u8]) -> Option<usize>;
}

/// `,*HH` additive checksum used by the ground station
#[derive(Debug, Clone, Copy, Default)]
pub struct AdditiveChecksum;

impl BoundaryLocator for AdditiveChecksum {
    fn boundary_of(&self, line: &[u8]) -> Option<usize> {
        command_boundary(line)
    }
}

/// Command text cut at its checksum boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCommand(String);

impl ValidatedCommand {
    /// Wrap command text, rejecting anything over [`COMMAND_CAPACITY`]
    ///
    /// # Errors
    ///
    /// `CommandTooLong` when the text does not fit, `CommandEncoding` when it
    /// is not UTF-8.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() >= COMMAND_CAPACITY {
            return Err(NodeError::CommandTooLong {
                len: bytes.len(),
                capacity: COMMAND_CAPACITY,
            });
        }
        let text = std::str::from_utf8(bytes).map_err(|_| NodeError::CommandEncoding)?;
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Validate a raw command line
///
/// Strips one trailing `\n`, then truncates at the boundary reported by
/// `locator`. Returns `None` when the boundary is missing, outside
/// `[0, 256)`, or past the end of the line.
pub fn validate_command(line: &[u8], locator: &dyn BoundaryLocator) -> Option<ValidatedCommand> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);

    let boundary = match locator.boundary_of(line) {
        Some(boundary) if boundary < MAX_BOUNDARY && boundary <= line.len() => boundary,
        Some(boundary) => {
            debug!("Command boundary {} out of range, dropping", boundary);
            return None;
        }
        None => {
            debug!("Command failed checksum validation, dropping");
            return None;
        }
    };

    match ValidatedCommand::new(&line[..boundary]) {
        Ok(command) => Some(command),
        Err(e) => {
            warn!("Rejected command: {}", e);
            None
        }
    }
}

/// Decoded command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reset for a new run
    Reset,
    /// Text for the on-board display
    UserMessage(String),
    /// Anything else
    Unknown(String),
}

impl Command {
    pub fn parse(command: &ValidatedCommand) -> Self {
        let text = command.as_str();
        match text.chars().next() {
            Some('R') => Command::Reset,
            Some('U') => Command::UserMessage(text.get(2..).unwrap_or("").to_string()),
            _ => Command::Unknown(text.to_string()),
        }
    }
}

/// Performs validated commands
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command: &ValidatedCommand);
}

/// Executor driving the on-board display queue
#[derive(Debug, Default)]
pub struct DisplayExecutor {
    queue: Mutex<VecDeque<String>>,
}

impl DisplayExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest pending display message
    pub fn next_message(&self) -> Option<String> {
        self.with_queue(|queue| queue.pop_front())
    }

    /// Number of messages waiting for the display
    pub fn pending(&self) -> usize {
        self.with_queue(|queue| queue.len())
    }

    fn with_queue<T>(&self, f: impl FnOnce(&mut VecDeque<String>) -> T) -> T {
        match self.queue.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl CommandExecutor for DisplayExecutor {
    fn execute(&self, command: &ValidatedCommand) {
        match Command::parse(command) {
            Command::Reset => {
                info!("Reset command received, clearing display queue");
                self.with_queue(|queue| queue.clear());
            }
            Command::UserMessage(text) => {
                let formatted = display::format_user_message(&text);
                if formatted.is_empty() {
                    debug!("Ignoring empty user message");
                    return;
                }
                info!("User message queued: {:?}", text);
                self.with_queue(|queue| {
                    if queue.len() == DISPLAY_QUEUE_CAPACITY {
                        queue.pop_front();
                    }
                    queue.push_back(formatted);
                });
            }
            Command::Unknown(text) => {
                warn!("Unknown command ignored: {:?}", text);
            }
        }
    }
}
