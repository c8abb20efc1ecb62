//! # Channel Model
//!
//! Physical ports, logical roles and the channels that bind one to the other.

use std::fmt;

/// A physical UART, identified by its single-character device index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalPort(pub char);

impl PhysicalPort {
    /// Device path for this port under the given prefix (e.g. `/dev/ttyS3`)
    pub fn device_path(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.0)
    }
}

impl fmt::Display for PhysicalPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical role a physical port plays once bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    GpsPrimary,
    GpsSecondary,
    Radio,
    Sensor,
}

impl Role {
    /// Source tag used in the telemetry log for valid lines
    pub fn log_tag(&self) -> &'static str {
        match self {
            Role::GpsPrimary => "GP1",
            Role::GpsSecondary => "GP2",
            Role::Radio => "RADIO",
            Role::Sensor => "MC2",
        }
    }

    /// Source tag used in the telemetry log for invalid lines
    pub fn invalid_log_tag(&self) -> &'static str {
        match self {
            Role::GpsPrimary => "GP1-Invalid",
            Role::GpsSecondary => "GP2-Invalid",
            Role::Radio => "RADIO-Invalid",
            Role::Sensor => "MC2-Invalid",
        }
    }

    /// Short label used when logging binding decisions
    pub fn binding_label(&self) -> &'static str {
        match self {
            Role::GpsPrimary => "GPS1",
            Role::GpsSecondary => "GPS2",
            Role::Radio => "Radio",
            Role::Sensor => "Proc2",
        }
    }

    /// Human-readable channel name
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::GpsPrimary => "GPS 1",
            Role::GpsSecondary => "GPS 2",
            Role::Radio => "Radio Modem",
            Role::Sensor => "MicroController 2",
        }
    }

    pub fn is_gps(&self) -> bool {
        matches!(self, Role::GpsPrimary | Role::GpsSecondary)
    }
}

/// A logical channel bound to one physical port for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    port: PhysicalPort,
    role: Role,
}

impl Channel {
    pub fn new(port: PhysicalPort, role: Role) -> Self {
        Self { port, role }
    }

    pub fn port(&self) -> PhysicalPort {
        self.port
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn name(&self) -> &'static str {
        self.role.display_name()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (port {})", self.name(), self.port)
    }
}
