//! # Dispatch Module
//!
//! Per-channel message handling.
//!
//! Each channel gets a handler with a valid-line and an invalid-line entry
//! point. Handlers know nothing about hardware: they take one line and return
//! the effects it should have. The [`node::Node`] applies those effects
//! (telemetry log write, fix or sensor publish, command execution).
//!
//! Every invocation yields exactly one log effect, always first, whatever
//! happens to the line afterwards. Invalid lines are logged and dropped.

pub mod node;

use tracing::debug;

use crate::channel::Role;
use crate::command::{validate_command, AdditiveChecksum, BoundaryLocator, ValidatedCommand};
use crate::gps::{is_accepted_sentence, GpsReport, SpeedUnit};
use crate::nmea::{NmeaParser, SentenceParser};
use crate::sensor::SensorSample;

/// Something a handled line asks the runtime to do
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append the raw line to the telemetry log
    Log { tag: &'static str, payload: Vec<u8> },
    /// Publish a processed GPS fix for the handling channel
    PublishFix(GpsReport),
    /// Publish a sensor sample
    PublishSensor(SensorSample),
    /// Run a validated command
    Execute(ValidatedCommand),
}

impl Effect {
    fn log(tag: &'static str, line: &[u8]) -> Self {
        Effect::Log {
            tag,
            payload: line.to_vec(),
        }
    }
}

/// Message semantics of one logical channel
pub trait ChannelHandler: Send {
    /// Role this handler serves
    fn role(&self) -> Role;

    /// Handle a well-formed line
    fn on_valid_line(&mut self, line: &[u8]) -> Vec<Effect>;

    /// Handle a garbled line: log it and drop it
    fn on_invalid_line(&mut self, line: &[u8]) -> Vec<Effect> {
        vec![Effect::log(self.role().invalid_log_tag(), line)]
    }
}

/// GPS channel: filter, parse, apply fix policy
pub struct GpsHandler {
    role: Role,
    parser: Box<dyn SentenceParser>,
    unit: SpeedUnit,
}

impl GpsHandler {
    pub fn new(role: Role, parser: Box<dyn SentenceParser>, unit: SpeedUnit) -> Self {
        Self { role, parser, unit }
    }
}

impl ChannelHandler for GpsHandler {
    fn role(&self) -> Role {
        self.role
    }

    fn on_valid_line(&mut self, line: &[u8]) -> Vec<Effect> {
        let mut effects = vec![Effect::log(self.role.log_tag(), line)];

        if !is_accepted_sentence(line) {
            return effects;
        }

        match self.parser.parse(line) {
            Some(fix) => effects.push(Effect::PublishFix(GpsReport::from_fix(&fix, self.unit))),
            None => debug!("{}: sentence did not yield a fix", self.role.display_name()),
        }

        effects
    }
}

/// Radio channel: validate and forward commands
pub struct RadioHandler {
    locator: Box<dyn BoundaryLocator>,
}

impl RadioHandler {
    pub fn new(locator: Box<dyn BoundaryLocator>) -> Self {
        Self { locator }
    }
}

impl ChannelHandler for RadioHandler {
    fn role(&self) -> Role {
        Role::Radio
    }

    fn on_valid_line(&mut self, line: &[u8]) -> Vec<Effect> {
        let mut effects = vec![Effect::log(Role::Radio.log_tag(), line)];

        if let Some(command) = validate_command(line, self.locator.as_ref()) {
            effects.push(Effect::Execute(command));
        }

        effects
    }
}

/// Microcontroller channel: parse sensor samples
#[derive(Debug, Default)]
pub struct SensorHandler;

impl ChannelHandler for SensorHandler {
    fn role(&self) -> Role {
        Role::Sensor
    }

    fn on_valid_line(&mut self, line: &[u8]) -> Vec<Effect> {
        let mut effects = vec![Effect::log(Role::Sensor.log_tag(), line)];

        match SensorSample::parse(line) {
            Ok(sample) => effects.push(Effect::PublishSensor(sample)),
            Err(e) => debug!("Dropping sensor line: {}", e),
        }

        effects
    }
}

/// Production handler for a role
pub fn handler_for(role: Role, unit: SpeedUnit) -> Box<dyn ChannelHandler> {
    match role {
        Role::GpsPrimary | Role::GpsSecondary => {
            Box::new(GpsHandler::new(role, Box::new(NmeaParser::new()), unit))
        }
        Role::Radio => Box::new(RadioHandler::new(Box::new(AdditiveChecksum))),
        Role::Sensor => Box::new(SensorHandler),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockBoundaryLocator;
    use crate::gps::Altitude;
    use crate::nmea::GpsFix;

    /// Parser stub returning a fixed answer and counting calls
    struct StubParser {
        answer: Option<GpsFix>,
        calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl SentenceParser for StubParser {
        fn parse(&mut self, _sentence: &[u8]) -> Option<GpsFix> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.answer
        }
    }

    fn gps_handler(answer: Option<GpsFix>) -> (GpsHandler, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let parser = StubParser {
            answer,
            calls: calls.clone(),
        };
        (GpsHandler::new(Role::GpsPrimary, Box::new(parser), SpeedUnit::Kph), calls)
    }

    fn fix(fix: bool, altitude: f64) -> GpsFix {
        GpsFix {
            latitude: 48.1173,
            longitude: 11.516666666666667,
            altitude,
            speed_knots: 10.0,
            heading: 84.4,
            fix,
            satellites: 8,
        }
    }

    fn log_tags(effects: &[Effect]) -> Vec<&'static str> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Log { tag, .. } => Some(*tag),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_gps_valid_fix_publishes_report() {
        let (mut handler, calls) = gps_handler(Some(fix(true, 120.0)));
        let effects = handler.on_valid_line(b"$GPGGA,123519*47\r\n");

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(effects.len(), 2);
        assert_eq!(
            effects[0],
            Effect::Log {
                tag: "GP1",
                payload: b"$GPGGA,123519*47\r\n".to_vec()
            }
        );
        match &effects[1] {
            Effect::PublishFix(report) => {
                assert_eq!(report.altitude, Altitude::Valid(120.0));
                assert!((report.speed - 18.52).abs() < 1e-9);
            }
            other => panic!("Expected PublishFix, got {:?}", other),
        }
    }

    #[test]
    fn test_gps_without_fix_publishes_sentinel() {
        let (mut handler, _) = gps_handler(Some(fix(false, 120.0)));
        let effects = handler.on_valid_line(b"$GPRMC,123519,V*00\n");

        match &effects[1] {
            Effect::PublishFix(report) => assert_eq!(report.altitude, Altitude::Invalid),
            other => panic!("Expected PublishFix, got {:?}", other),
        }
    }

    #[test]
    fn test_gps_unaccepted_sentence_only_logged() {
        let (mut handler, calls) = gps_handler(Some(fix(true, 120.0)));
        let effects = handler.on_valid_line(b"$GPGSV,3,1,11*74\n");

        assert_eq!(log_tags(&effects), vec!["GP1"]);
        assert_eq!(effects.len(), 1);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_gps_parse_failure_only_logged() {
        let (mut handler, calls) = gps_handler(None);
        let effects = handler.on_valid_line(b"$GPRMC,garbage\n");

        assert_eq!(effects.len(), 1);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_gps_invalid_line_logged_under_invalid_tag() {
        let (mut handler, calls) = gps_handler(Some(fix(true, 120.0)));
        let effects = handler.on_invalid_line(&[0x24, 0xFF, 0x0A]);

        assert_eq!(log_tags(&effects), vec!["GP1-Invalid"]);
        assert_eq!(
            effects[0],
            Effect::Log {
                tag: "GP1-Invalid",
                payload: vec![0x24, 0xFF, 0x0A]
            }
        );
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_secondary_gps_tags() {
        let mut handler = handler_for(Role::GpsSecondary, SpeedUnit::Kph);
        assert_eq!(handler.role(), Role::GpsSecondary);
        assert_eq!(log_tags(&handler.on_valid_line(b"$GPGSV\n")), vec!["GP2"]);
        assert_eq!(log_tags(&handler.on_invalid_line(b"\xFF")), vec!["GP2-Invalid"]);
    }

    #[test]
    fn test_radio_forwards_validated_command() {
        let mut locator = MockBoundaryLocator::new();
        locator.expect_boundary_of().times(1).return_const(Some(15usize));
        let mut handler = RadioHandler::new(Box::new(locator));

        let effects = handler.on_valid_line(b"U,Hello balloon,*7C\n");

        assert_eq!(log_tags(&effects), vec!["RADIO"]);
        assert_eq!(
            effects[1],
            Effect::Execute(ValidatedCommand::new(b"U,Hello balloon").unwrap())
        );
    }

    #[test]
    fn test_radio_drops_failed_validation() {
        let mut locator = MockBoundaryLocator::new();
        locator.expect_boundary_of().return_const(None::<usize>);
        let mut handler = RadioHandler::new(Box::new(locator));

        let effects = handler.on_valid_line(b"U,Hello balloon,*00\n");
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_radio_invalid_line_never_validated() {
        let mut locator = MockBoundaryLocator::new();
        locator.expect_boundary_of().times(0);
        let mut handler = RadioHandler::new(Box::new(locator));

        let effects = handler.on_invalid_line(b"U,\x00\x01\n");
        assert_eq!(log_tags(&effects), vec!["RADIO-Invalid"]);
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_sensor_handler() {
        let mut handler = SensorHandler;
        let line = b"21.5,40.1,1013.2,0.01,0.02,9.81,270.0,1.5,-2.5,0.3,7.4,120,\
                     0.1,0.2,9.8,30.0,-12.0,44.0,0.5,0.6,0.7,0.0,0.0,9.81,152.3\n";

        let effects = handler.on_valid_line(line);
        assert_eq!(log_tags(&effects), vec!["MC2"]);
        assert!(matches!(effects[1], Effect::PublishSensor(ref s) if s.altitude_m == 152.3));

        let effects = handler.on_valid_line(b"21.5,40.1\n");
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_every_invocation_logs_exactly_once() {
        let lines: [&[u8]; 5] = [
            b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\n",
            b"$GPRMC,bad\n",
            b"U,Hello balloon,*7C\n",
            b"nonsense\n",
            b"\xFF\xFE",
        ];

        for role in [Role::GpsPrimary, Role::GpsSecondary, Role::Radio, Role::Sensor] {
            let mut handler = handler_for(role, SpeedUnit::Kph);
            for line in lines {
                assert_eq!(log_tags(&handler.on_valid_line(line)), vec![role.log_tag()]);
                assert_eq!(log_tags(&handler.on_invalid_line(line)), vec![role.invalid_log_tag()]);
            }
        }
    }
}
