//! # Node Runtime
//!
//! Shared state of a running node, the per-channel read loops and the
//! periodic downlink record.
//!
//! One task per channel blocks on its port, routes each line to the valid or
//! invalid entry point of the channel's handler, and applies the returned
//! effects. Channels only meet at the telemetry log, which serializes appends,
//! and at the fix and sensor states, which each have a single writer. The
//! downlink task is the reader of those states.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::{handler_for, ChannelHandler, Effect};
use crate::channel::{Channel, Role};
use crate::command::CommandExecutor;
use crate::gps::{FixState, SpeedUnit};
use crate::sensor::SensorState;
use crate::serial::binder::OpenChannel;
use crate::serial::{is_clean_line, ReadOutcome};
use crate::telemetry::downlink::{self, DOWNLINK_LOG_TAG};
use crate::telemetry::TelemetryLog;

/// State shared by every channel task
pub struct Node {
    log: Arc<TelemetryLog>,
    primary_fix: FixState,
    secondary_fix: FixState,
    sensors: SensorState,
    executor: Arc<dyn CommandExecutor>,
}

impl Node {
    pub fn new(log: TelemetryLog, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            log: Arc::new(log),
            primary_fix: FixState::new(),
            secondary_fix: FixState::new(),
            sensors: SensorState::new(),
            executor,
        }
    }

    pub fn log(&self) -> &TelemetryLog {
        &self.log
    }

    /// Fix published by the primary GPS
    pub fn primary_fix(&self) -> &FixState {
        &self.primary_fix
    }

    /// Fix published by the secondary GPS
    pub fn secondary_fix(&self) -> &FixState {
        &self.secondary_fix
    }

    pub fn sensors(&self) -> &SensorState {
        &self.sensors
    }

    /// Apply the effects of one handled line, in order
    ///
    /// Log writes run on the blocking pool and are awaited, so a channel's
    /// records stay in arrival order.
    pub async fn apply(&self, role: Role, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Log { tag, payload } => Arc::clone(&self.log).record_async(tag, payload).await,
                Effect::PublishFix(report) => match role {
                    Role::GpsPrimary => self.primary_fix.publish(&report),
                    Role::GpsSecondary => self.secondary_fix.publish(&report),
                    other => warn!("{} produced a GPS fix, ignoring", other.display_name()),
                },
                Effect::PublishSensor(sample) => self.sensors.publish(sample),
                Effect::Execute(command) => {
                    debug!("Executing command {:?}", command.as_str());
                    self.executor.execute(&command);
                }
            }
        }
    }

    /// Route one line through a handler
    pub async fn dispatch(&self, handler: &mut dyn ChannelHandler, line: &[u8]) {
        let effects = if is_clean_line(line) {
            handler.on_valid_line(line)
        } else {
            handler.on_invalid_line(line)
        };
        self.apply(handler.role(), effects).await;
    }

    /// Read loop for one channel
    ///
    /// Runs until the port closes or a read fails, then closes the port.
    /// Read timeouts are not events; the loop simply waits again.
    pub async fn run_channel(self: Arc<Self>, open: OpenChannel, mut handler: Box<dyn ChannelHandler>) {
        let OpenChannel { channel, mut source } = open;
        info!("Listening on {}", channel);

        let mut lines: u64 = 0;
        loop {
            match source.read_line().await {
                Ok(ReadOutcome::Line(line)) => {
                    lines += 1;
                    self.dispatch(handler.as_mut(), &line).await;
                }
                Ok(ReadOutcome::Timeout) => continue,
                Ok(ReadOutcome::Closed) => {
                    warn!("{} closed", channel);
                    break;
                }
                Err(e) => {
                    error!("Read failed on {}: {}", channel, e);
                    break;
                }
            }
        }

        info!("{} stopped after {} lines", channel, lines);
        source.close();
    }

    /// Spawn a read loop for every open channel with its production handler
    pub fn spawn_channels(self: &Arc<Self>, channels: Vec<OpenChannel>, unit: SpeedUnit) -> Vec<JoinHandle<()>> {
        channels
            .into_iter()
            .map(|open| {
                let handler = handler_for(open.channel.role(), unit);
                tokio::spawn(Arc::clone(self).run_channel(open, handler))
            })
            .collect()
    }

    /// Downlink record from the latest published state
    ///
    /// GPS fields come from the primary receiver, or the secondary one while
    /// the primary has published nothing.
    pub fn downlink_record(&self, timestamp: &DateTime<Utc>) -> String {
        let gps_record = match self.primary_fix.snapshot().or_else(|| self.secondary_fix.snapshot()) {
            Some(snapshot) => snapshot.record,
            None => downlink::no_fix_record(),
        };
        let sample = self.sensors.latest().unwrap_or_default();

        downlink::compose(timestamp, &gps_record, &sample)
    }

    /// Log a downlink record every `period`, forever
    pub async fn run_downlink(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Downlink record every {:?}", period);

        loop {
            ticker.tick().await;
            let record = self.downlink_record(&Utc::now());
            Arc::clone(&self.log)
                .record_async(DOWNLINK_LOG_TAG, record.into_bytes())
                .await;
        }
    }
}

/// Channels a node listens on, in binding order
pub fn channel_summary(channels: &[Channel]) -> String {
    channels
        .iter()
        .map(|channel| channel.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
