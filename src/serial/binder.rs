//! # Channel Binder
//!
//! Decides which physical port plays which role and opens the four channels.
//!
//! The node's UARTs come in two pairs, and the devices within a pair can be
//! swapped between flights. One member of each pair is probed; if it talks
//! NMEA it becomes the pair's GPS channel and its partner takes the other
//! role, otherwise the arrangement is reversed. `NoData` is handled the same
//! as `Other`.

use tracing::{error, info};

use super::port_trait::{LineSource, LineTransport};
use super::probe::{probe, ProbeOutcome, ProbeSettings};
use crate::channel::{Channel, PhysicalPort, Role};
use crate::error::Result;
use crate::telemetry::TelemetryLog;

/// Log tag for binding decisions
pub const BINDING_LOG_TAG: &str = "InitDevices";

/// Two ports whose roles are resolved by one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    /// Port that gets probed
    pub probed: PhysicalPort,
    /// The other member of the pair
    pub partner: PhysicalPort,
    /// Role of whichever port carries GPS
    pub gps_role: Role,
    /// Role of the other port
    pub other_role: Role,
}

/// Primary GPS and radio modem share UARTs 3 and 2
pub const GPS_RADIO_PAIR: PortPair = PortPair {
    probed: PhysicalPort('3'),
    partner: PhysicalPort('2'),
    gps_role: Role::GpsPrimary,
    other_role: Role::Radio,
};

/// Secondary GPS and microcontroller share UARTs 1 and 0
pub const GPS_SENSOR_PAIR: PortPair = PortPair {
    probed: PhysicalPort('1'),
    partner: PhysicalPort('0'),
    gps_role: Role::GpsSecondary,
    other_role: Role::Sensor,
};

/// Resolved roles for one pair, GPS channel first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairBinding {
    pub gps: Channel,
    pub other: Channel,
}

impl PairBinding {
    /// Binding decision as written to the telemetry log, e.g. `GPS1-3, Radio-2`
    pub fn summary(&self) -> String {
        format!(
            "{}-{}, {}-{}",
            self.gps.role().binding_label(),
            self.gps.port(),
            self.other.role().binding_label(),
            self.other.port()
        )
    }

    pub fn channels(&self) -> [Channel; 2] {
        [self.gps, self.other]
    }
}

/// Pick one of the pair's two fixed arrangements from a probe outcome
pub fn resolve_pair(pair: &PortPair, outcome: ProbeOutcome) -> PairBinding {
    let (gps_port, other_port) = if outcome.is_gps() {
        (pair.probed, pair.partner)
    } else {
        (pair.partner, pair.probed)
    };

    PairBinding {
        gps: Channel::new(gps_port, pair.gps_role),
        other: Channel::new(other_port, pair.other_role),
    }
}

/// A channel with its port opened, ready for a read loop
pub struct OpenChannel {
    pub channel: Channel,
    pub source: Box<dyn LineSource>,
}

impl std::fmt::Debug for OpenChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenChannel")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// Runs the startup probes and opens the bound channels
#[derive(Debug, Clone)]
pub struct ChannelBinder {
    pairs: [PortPair; 2],
    settings: ProbeSettings,
}

impl ChannelBinder {
    pub fn new(settings: ProbeSettings) -> Self {
        Self {
            pairs: [GPS_RADIO_PAIR, GPS_SENSOR_PAIR],
            settings,
        }
    }

    /// Probe each pair and resolve all four channels
    ///
    /// Every decision is written to the telemetry log before returning.
    pub async fn bind(&self, transport: &dyn LineTransport, log: &TelemetryLog) -> Vec<Channel> {
        let mut channels = Vec::with_capacity(4);

        for pair in &self.pairs {
            let outcome = probe(transport, pair.probed, &self.settings).await;
            let binding = resolve_pair(pair, outcome);

            info!("Channel binding: {} (probe of port {}: {:?})", binding.summary(), pair.probed, outcome);
            log.record(BINDING_LOG_TAG, binding.summary().as_bytes());

            channels.extend(binding.channels());
        }

        channels
    }

    /// Open every bound channel
    ///
    /// # Errors
    ///
    /// Failing to open any channel is fatal for startup; ports opened so far
    /// are closed before returning.
    pub async fn open_all(
        &self,
        transport: &dyn LineTransport,
        channels: &[Channel],
    ) -> Result<Vec<OpenChannel>> {
        let mut opened: Vec<OpenChannel> = Vec::with_capacity(channels.len());

        for &channel in channels {
            match transport.open(channel.port()).await {
                Ok(source) => {
                    info!("Opened channel {}", channel);
                    opened.push(OpenChannel { channel, source });
                }
                Err(e) => {
                    error!("Failed to open channel {}: {}", channel, e);
                    for open in opened {
                        open.source.close();
                    }
                    return Err(e);
                }
            }
        }

        Ok(opened)
    }
}
