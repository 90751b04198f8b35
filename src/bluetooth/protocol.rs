// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Line protocol spoken by the logger.
//!
//! Inbound lines are classified by [`TelemetryDecoder`]; outbound
//! directives are modelled by [`Command`]. Both directions are plain ASCII,
//! one directive per line.

use chrono::{DateTime, Local};
use std::fmt;
use tracing::{debug, trace};

use super::telemetry::{SystemState, TelemetryUpdate, MAX_VIEW_MODE};
use crate::error::LinkError;

/// Line terminator appended to every outbound command.
pub const LINE_TERMINATOR: &str = "\n";

/// Format of `TIME=` values in both directions.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Marker that opens a telemetry line.
const TELEMETRY_MARKER: &str = "RS2";

/// Minimum length of a `YYYY-MM-DD HH:MM:SS` value.
const TIME_VALUE_LEN: usize = 19;

/// Commands understood by the logger.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Pause,
    Resume,
    ResetTrip,
    ResetOdometer,
    ResetMaxSpeed,
    NextView,
    PrevView,
    SetView(u8),
    SetWheel(f32),
    CalibrateMpu,
    Status,
    GetData,
    GetTime,
    /// `TIME=YYYY-MM-DD HH:MM:SS`
    SetTime(String),
    Sync,
    Ping,
    /// A validated token without a dedicated variant.
    Raw(String),
}

impl Command {
    /// Select a display view, 0-5.
    pub fn set_view(view: u8) -> Result<Self, LinkError> {
        if view > MAX_VIEW_MODE {
            return Err(LinkError::InvalidCommand(format!(
                "view {} out of range 0..={}",
                view, MAX_VIEW_MODE
            )));
        }
        Ok(Self::SetView(view))
    }

    /// Set the wheel circumference.
    pub fn set_wheel(circumference: f32) -> Result<Self, LinkError> {
        if !circumference.is_finite() || circumference <= 0.0 {
            return Err(LinkError::InvalidCommand(format!(
                "wheel circumference {} must be positive",
                circumference
            )));
        }
        Ok(Self::SetWheel(circumference))
    }

    /// Time sync for the given wall-clock instant.
    pub fn set_time(now: DateTime<Local>) -> Self {
        Self::SetTime(now.format(TIME_FORMAT).to_string())
    }

    /// Time sync for the current wall-clock time.
    pub fn sync_now() -> Self {
        Self::set_time(Local::now())
    }

    /// Wrap an arbitrary token after checking it fits on one line.
    pub fn raw(token: &str) -> Result<Self, LinkError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(LinkError::InvalidCommand("empty command".to_string()));
        }
        if !token.is_ascii() || token.chars().any(|c| c.is_ascii_control()) {
            return Err(LinkError::InvalidCommand(format!(
                "{:?} is not a printable ASCII token",
                token
            )));
        }
        Ok(Self::parse(token).unwrap_or_else(|| Self::Raw(token.to_string())))
    }

    /// Parse a wire token or a console spelling (`view 3`, `start`).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (name, arg) = match s.split_once(['=', ' ']) {
            Some((name, arg)) => (name, Some(arg.trim())),
            None => (s, None),
        };

        match (name.to_uppercase().as_str(), arg) {
            ("START", None) => Some(Self::Start),
            ("STOP", None) => Some(Self::Stop),
            ("PAUSE", None) => Some(Self::Pause),
            ("RESUME", None) => Some(Self::Resume),
            ("RESETTRIP", None) => Some(Self::ResetTrip),
            ("RESET_ODO", None) => Some(Self::ResetOdometer),
            ("RESETMAXSPEED", None) => Some(Self::ResetMaxSpeed),
            ("NEXTVIEW", None) => Some(Self::NextView),
            ("PREVVIEW", None) => Some(Self::PrevView),
            ("VIEW", Some(arg)) => arg.parse().ok().and_then(|v| Self::set_view(v).ok()),
            ("SETWHEEL", Some(arg)) => arg.parse().ok().and_then(|c| Self::set_wheel(c).ok()),
            ("CALIBRATE_MPU", None) => Some(Self::CalibrateMpu),
            ("STATUS", None) => Some(Self::Status),
            ("GETDATA", None) => Some(Self::GetData),
            ("GET_TIME", None) => Some(Self::GetTime),
            ("TIME", Some(arg)) => parse_clock(arg).map(|_| Self::SetTime(arg.to_string())),
            ("SYNC", None) => Some(Self::Sync),
            ("PING", None) => Some(Self::Ping),
            _ => None,
        }
    }

    /// Token as written on the wire, without terminator.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Start => "START".to_string(),
            Self::Stop => "STOP".to_string(),
            Self::Pause => "PAUSE".to_string(),
            Self::Resume => "RESUME".to_string(),
            Self::ResetTrip => "RESETTRIP".to_string(),
            Self::ResetOdometer => "RESET_ODO".to_string(),
            Self::ResetMaxSpeed => "RESETMAXSPEED".to_string(),
            Self::NextView => "NEXTVIEW".to_string(),
            Self::PrevView => "PREVVIEW".to_string(),
            Self::SetView(view) => format!("VIEW={}", view),
            Self::SetWheel(circumference) => format!("SETWHEEL={}", circumference),
            Self::CalibrateMpu => "CALIBRATE_MPU".to_string(),
            Self::Status => "STATUS".to_string(),
            Self::GetData => "GETDATA".to_string(),
            Self::GetTime => "GET_TIME".to_string(),
            Self::SetTime(time) => format!("TIME={}", time),
            Self::Sync => "SYNC".to_string(),
            Self::Ping => "PING".to_string(),
            Self::Raw(token) => token.clone(),
        }
    }

    /// Bytes to write, terminator included.
    pub fn encode(&self) -> Vec<u8> {
        let mut line = self.to_wire();
        line.push_str(LINE_TERMINATOR);
        line.into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// A classified inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Fields carried by a telemetry line.
    Telemetry(TelemetryUpdate),
    /// `ACK:<text>`
    Acknowledgement(String),
    /// `ERR:<text>`
    ErrorNotice(String),
    /// `GET_TIME` or `REQUEST_TIME_SYNC` sent by the device.
    TimeSyncRequest,
    /// `TIME:<text>`
    TimeResponse(String),
    /// `STATUS:<text>`
    Status(String),
    /// `BAT=<volts>`
    Battery(f32),
    /// Anything else.
    Unrecognized(String),
}

impl InboundMessage {
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

/// Telemetry keys and their targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Odometer,
    Trip,
    Speed,
    MaxSpeed,
    AvgSpeed,
    AccelZ,
    /// Sent by the device but not tracked.
    Ignored,
    State,
    Time,
    Battery,
    View,
    Stream,
}

const FIELDS: &[(&str, Field)] = &[
    ("ODO", Field::Odometer),
    ("TRIP", Field::Trip),
    ("SPD", Field::Speed),
    ("MAX", Field::MaxSpeed),
    ("AVG", Field::AvgSpeed),
    ("Z", Field::AccelZ),
    ("X", Field::Ignored),
    ("Y", Field::Ignored),
    ("STATE", Field::State),
    ("TIME", Field::Time),
    ("BAT", Field::Battery),
    ("VIEW", Field::View),
    ("STREAM", Field::Stream),
];

fn field_for(key: &str) -> Option<Field> {
    FIELDS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, field)| *field)
}

/// Classifies inbound lines and decodes telemetry fields.
///
/// Decoding is total: a bad field is skipped on its own and never fails
/// the rest of the line. Every recognized line bumps the packet counter.
#[derive(Debug, Default)]
pub struct TelemetryDecoder {
    packet_count: u64,
}

impl TelemetryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines recognized so far.
    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    /// Classify one trimmed line.
    pub fn decode(&mut self, line: &str) -> InboundMessage {
        let message = classify(line);
        match message {
            InboundMessage::Unrecognized(_) => {
                trace!("Unrecognized line: {}", line);
                message
            }
            InboundMessage::Telemetry(mut update) => {
                self.packet_count += 1;
                update.packet_count = self.packet_count;
                InboundMessage::Telemetry(update)
            }
            other => {
                self.packet_count += 1;
                other
            }
        }
    }
}

fn classify(line: &str) -> InboundMessage {
    if let Some(text) = line.strip_prefix("ACK:") {
        return InboundMessage::Acknowledgement(text.trim().to_string());
    }
    if let Some(text) = line.strip_prefix("ERR:") {
        return InboundMessage::ErrorNotice(text.trim().to_string());
    }
    if line == "GET_TIME" || line == "REQUEST_TIME_SYNC" {
        return InboundMessage::TimeSyncRequest;
    }
    if let Some(text) = line.strip_prefix("TIME:") {
        return InboundMessage::TimeResponse(text.trim().to_string());
    }
    if let Some(text) = line.strip_prefix("STATUS:") {
        return InboundMessage::Status(text.trim().to_string());
    }
    if let Some(volts) = line
        .strip_prefix("BAT=")
        .and_then(|v| parse_distance(v.trim()))
    {
        return InboundMessage::Battery(volts);
    }

    let body = if let Some(rest) = line.strip_prefix("DATA:") {
        Some(rest)
    } else if let Some(rest) = line.strip_prefix(TELEMETRY_MARKER) {
        Some(rest.strip_prefix(',').unwrap_or(rest))
    } else if carries_known_field(line) {
        Some(line)
    } else {
        None
    };

    match body {
        Some(body) => InboundMessage::Telemetry(decode_fields(body)),
        None => InboundMessage::Unrecognized(line.to_string()),
    }
}

fn carries_known_field(line: &str) -> bool {
    line.split(',').any(|token| {
        token
            .split_once('=')
            .is_some_and(|(key, _)| field_for(key.trim()).is_some())
    })
}

/// Decode `KEY=VALUE` tokens into a partial update.
fn decode_fields(body: &str) -> TelemetryUpdate {
    let mut update = TelemetryUpdate::default();

    for token in body.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let field = token
            .split_once('=')
            .and_then(|(key, value)| field_for(key.trim()).map(|f| (f, key, value.trim())));

        match field {
            Some((field, key, value)) => {
                if let Err(e) = apply_field(&mut update, field, key, value) {
                    debug!("{}", e);
                }
            }
            None if token.to_uppercase().contains("SYNC") => {
                update.time_sync_pending = Some(token.to_uppercase().contains("PENDING"));
            }
            None => trace!("Ignoring token {}", token),
        }
    }

    update
}

fn apply_field(
    update: &mut TelemetryUpdate,
    field: Field,
    key: &str,
    value: &str,
) -> Result<(), LinkError> {
    let skipped = || LinkError::DecodeSkipped {
        key: key.to_string(),
        value: value.to_string(),
    };

    match field {
        Field::Odometer => update.odometer_m = Some(parse_distance(value).ok_or_else(skipped)?),
        Field::Trip => update.trip_distance_m = Some(parse_distance(value).ok_or_else(skipped)?),
        Field::Speed => update.speed_kmh = Some(parse_distance(value).ok_or_else(skipped)?),
        Field::MaxSpeed => update.max_speed_kmh = Some(parse_distance(value).ok_or_else(skipped)?),
        Field::AvgSpeed => update.avg_speed_kmh = Some(parse_distance(value).ok_or_else(skipped)?),
        Field::AccelZ => update.acceleration_z = Some(parse_float(value).ok_or_else(skipped)?),
        Field::Ignored => {}
        Field::State => {
            let state = value
                .parse::<u8>()
                .ok()
                .and_then(SystemState::from_code)
                .ok_or_else(skipped)?;
            update.system_state = Some(state);
        }
        Field::Time => {
            update.timestamp = Some(value.to_string());
            match parse_clock(value) {
                Some((hour, minute)) => {
                    update.hour = Some(hour);
                    update.minute = Some(minute);
                    update.time_valid = Some(true);
                    update.time_sync_pending = Some(false);
                }
                None => {
                    update.time_valid = Some(false);
                    return Err(skipped());
                }
            }
        }
        Field::Battery => update.battery_voltage = Some(parse_distance(value).ok_or_else(skipped)?),
        Field::View => {
            let view = value
                .parse::<u8>()
                .ok()
                .filter(|v| *v <= MAX_VIEW_MODE)
                .ok_or_else(skipped)?;
            update.view_mode = Some(view);
        }
        Field::Stream => update.data_streaming = Some(parse_bool(value).ok_or_else(skipped)?),
    }

    Ok(())
}

fn parse_float(value: &str) -> Option<f32> {
    value.parse::<f32>().ok().filter(|v| v.is_finite())
}

/// A float that cannot be negative (speeds, distances, volts).
fn parse_distance(value: &str) -> Option<f32> {
    parse_float(value).filter(|v| *v >= 0.0)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Hour and minute of a `YYYY-MM-DD HH:MM:SS` value.
fn parse_clock(value: &str) -> Option<(u8, u8)> {
    if value.len() < TIME_VALUE_LEN {
        return None;
    }
    let hour = value.get(11..13)?.parse::<u8>().ok().filter(|h| *h < 24)?;
    let minute = value.get(14..16)?.parse::<u8>().ok().filter(|m| *m < 60)?;
    Some((hour, minute))
}

/// Friendly text for a device acknowledgement.
pub fn describe_ack(text: &str) -> String {
    let upper = text.to_uppercase();
    let known = [
        ("STARTED", "Logging STARTED"),
        ("STOPPED", "Logging STOPPED"),
        ("PAUSED", "Logging PAUSED"),
        ("RESET_COMPLETE", "Trip RESET complete"),
        ("TIME_SYNC_COMPLETE", "Time SYNC complete"),
        ("WHEEL_SET", "Wheel circumference updated"),
        ("MPU_CALIBRATED", "MPU6050 calibrated"),
    ];

    known
        .iter()
        .find(|(marker, _)| upper.contains(marker))
        .map(|(_, message)| message.to_string())
        .unwrap_or_else(|| format!("ACK: {}", text))
}

/// Snapshot side effects implied by an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckEffect {
    TripReset,
    OdometerReset,
    TimeSynced,
}

/// Parse an acknowledgement into its snapshot side effect, if any.
pub fn ack_effect(text: &str) -> Option<AckEffect> {
    let upper = text.to_uppercase();
    if upper.contains("TRIP_RESET") {
        Some(AckEffect::TripReset)
    } else if upper.contains("ODO_RESET") || upper.contains("RESET_ODO") {
        Some(AckEffect::OdometerReset)
    } else if upper.contains("TIME_SYNC_COMPLETE") {
        Some(AckEffect::TimeSynced)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn telemetry(decoder: &mut TelemetryDecoder, line: &str) -> TelemetryUpdate {
        match decoder.decode(line) {
            InboundMessage::Telemetry(update) => update,
            other => panic!("expected telemetry, got {:?}", other),
        }
    }

    #[test]
    fn test_full_telemetry_line() {
        let mut decoder = TelemetryDecoder::new();
        let update = telemetry(&mut decoder, "RS2,ODO=120.5,SPD=33.2,STATE=1");

        assert_eq!(update.odometer_m, Some(120.5));
        assert_eq!(update.speed_kmh, Some(33.2));
        assert_eq!(update.system_state, Some(SystemState::Running));
        assert_eq!(update.packet_count, 1);
        assert_eq!(update.trip_distance_m, None);
        assert_eq!(decoder.packet_count(), 1);
    }

    #[test]
    fn test_all_keys() {
        let mut decoder = TelemetryDecoder::new();
        let update = telemetry(
            &mut decoder,
            "RS2,ODO=1000,TRIP=250.5,SPD=12.5,MAX=40,AVG=20.1,Z=-0.12,X=0.3,Y=0.1,\
             STATE=3,TIME=2025-01-15 08:07:30,BAT=3.95,VIEW=4,STREAM=true,SYNC=PENDING",
        );

        assert_eq!(update.trip_distance_m, Some(250.5));
        assert_eq!(update.max_speed_kmh, Some(40.0));
        assert_eq!(update.avg_speed_kmh, Some(20.1));
        assert_eq!(update.acceleration_z, Some(-0.12));
        assert_eq!(update.system_state, Some(SystemState::Paused));
        assert_eq!(update.hour, Some(8));
        assert_eq!(update.minute, Some(7));
        assert_eq!(update.time_valid, Some(true));
        assert_eq!(update.battery_voltage, Some(3.95));
        assert_eq!(update.view_mode, Some(4));
        assert_eq!(update.data_streaming, Some(true));
        // SYNC token comes after TIME, so it wins
        assert_eq!(update.time_sync_pending, Some(true));
    }

    #[test]
    fn test_unparsable_field_is_skipped() {
        let mut decoder = TelemetryDecoder::new();
        let update = telemetry(&mut decoder, "SPD=abc,ODO=5");
        assert_eq!(update.speed_kmh, None);
        assert_eq!(update.odometer_m, Some(5.0));
        assert_eq!(update.packet_count, 1);
    }

    #[test]
    fn test_out_of_range_values_skipped() {
        let mut decoder = TelemetryDecoder::new();
        let update = telemetry(&mut decoder, "RS2,STATE=7,VIEW=9,SPD=-3,Z=NaN,STREAM=maybe");
        assert!(update.is_empty());
    }

    #[test]
    fn test_time_field() {
        let mut decoder = TelemetryDecoder::new();
        let update = telemetry(&mut decoder, "TIME=2025-01-15 08:07:30");
        assert_eq!(update.hour, Some(8));
        assert_eq!(update.minute, Some(7));
        assert_eq!(update.time_valid, Some(true));
        assert_eq!(update.time_sync_pending, Some(false));

        let update = telemetry(&mut decoder, "RS2,TIME=2025-01-15 08:0");
        assert_eq!(update.time_valid, Some(false));
        assert_eq!(update.hour, None);
        assert_eq!(update.minute, None);

        let update = telemetry(&mut decoder, "RS2,TIME=2025-01-15 xx:07:30");
        assert_eq!(update.time_valid, Some(false));
        assert_eq!(update.hour, None);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let mut decoder = TelemetryDecoder::new();
        let update = telemetry(&mut decoder, "RS2,FOO=1,SPD=2,garbage,BAR");
        assert_eq!(update.speed_kmh, Some(2.0));
    }

    #[test]
    fn test_marker_without_comma() {
        let mut decoder = TelemetryDecoder::new();
        let update = telemetry(&mut decoder, "RS2SPD=9");
        assert_eq!(update.speed_kmh, Some(9.0));

        // A bare marker is still a packet
        let update = telemetry(&mut decoder, "RS2");
        assert!(update.is_empty());
        assert_eq!(update.packet_count, 2);
    }

    #[test]
    fn test_data_response() {
        let mut decoder = TelemetryDecoder::new();
        let update = telemetry(&mut decoder, "DATA:ODO=10,TRIP=2,SPD=0,STATE=2");
        assert_eq!(update.odometer_m, Some(10.0));
        assert_eq!(update.system_state, Some(SystemState::Stopped));
    }

    #[test]
    fn test_classification_precedence() {
        let mut decoder = TelemetryDecoder::new();
        assert_eq!(
            decoder.decode("ACK:TIME=2025"),
            InboundMessage::Acknowledgement("TIME=2025".to_string())
        );
        assert_eq!(
            decoder.decode("ERR:UNKNOWN_CMD"),
            InboundMessage::ErrorNotice("UNKNOWN_CMD".to_string())
        );
        assert_eq!(decoder.decode("GET_TIME"), InboundMessage::TimeSyncRequest);
        assert_eq!(decoder.decode("REQUEST_TIME_SYNC"), InboundMessage::TimeSyncRequest);
        assert_eq!(
            decoder.decode("TIME:2025-01-15 08:07:30"),
            InboundMessage::TimeResponse("2025-01-15 08:07:30".to_string())
        );
        assert_eq!(
            decoder.decode("STATUS:RUNNING,SPD=3"),
            InboundMessage::Status("RUNNING,SPD=3".to_string())
        );
        assert_eq!(decoder.decode("BAT=3.7"), InboundMessage::Battery(3.7));
        assert_eq!(decoder.packet_count(), 7);
    }

    #[test]
    fn test_bad_battery_line_falls_through() {
        let mut decoder = TelemetryDecoder::new();
        let update = telemetry(&mut decoder, "BAT=3.9,SPD=4");
        assert_eq!(update.battery_voltage, Some(3.9));
        assert_eq!(update.speed_kmh, Some(4.0));
    }

    #[test]
    fn test_unrecognized_not_counted() {
        let mut decoder = TelemetryDecoder::new();
        assert_eq!(
            decoder.decode("hello world"),
            InboundMessage::Unrecognized("hello world".to_string())
        );
        assert_eq!(
            decoder.decode("SYNC_DONE"),
            InboundMessage::Unrecognized("SYNC_DONE".to_string())
        );
        assert_eq!(decoder.packet_count(), 0);
    }

    #[test]
    fn test_command_tokens() {
        assert_eq!(Command::Start.to_wire(), "START");
        assert_eq!(Command::ResetOdometer.to_wire(), "RESET_ODO");
        assert_eq!(Command::set_view(3).unwrap().to_wire(), "VIEW=3");
        assert_eq!(Command::set_wheel(2.1).unwrap().to_wire(), "SETWHEEL=2.1");
        assert_eq!(Command::Ping.encode(), b"PING\n".to_vec());
        assert!(Command::set_view(6).is_err());
        assert!(Command::set_wheel(0.0).is_err());
    }

    #[test]
    fn test_set_time_format() {
        let at = Local.with_ymd_and_hms(2025, 1, 15, 8, 7, 30).unwrap();
        assert_eq!(Command::set_time(at).to_wire(), "TIME=2025-01-15 08:07:30");
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("start"), Some(Command::Start));
        assert_eq!(Command::parse("VIEW=2"), Some(Command::SetView(2)));
        assert_eq!(Command::parse("view 5"), Some(Command::SetView(5)));
        assert_eq!(Command::parse("view 6"), None);
        assert_eq!(Command::parse("setwheel 1.95"), Some(Command::SetWheel(1.95)));
        assert_eq!(
            Command::parse("TIME=2025-01-15 08:07:30"),
            Some(Command::SetTime("2025-01-15 08:07:30".to_string()))
        );
        assert_eq!(Command::parse("TIME=yesterday"), None);
        assert_eq!(Command::parse("reset_odo"), Some(Command::ResetOdometer));
        assert_eq!(Command::parse("bogus"), None);
    }

    #[test]
    fn test_raw_command_validation() {
        assert_eq!(Command::raw(" stop "), Ok(Command::Stop));
        assert_eq!(Command::raw("LED=ON"), Ok(Command::Raw("LED=ON".to_string())));
        assert!(Command::raw("").is_err());
        assert!(Command::raw("A\nB").is_err());
        assert!(Command::raw("VIEW=ü").is_err());
    }

    #[test]
    fn test_view_round_trip() {
        let sent = Command::set_view(3).unwrap().to_wire();
        let mut decoder = TelemetryDecoder::new();
        let update = telemetry(&mut decoder, &sent);
        assert_eq!(update.view_mode, Some(3));
    }

    #[test]
    fn test_ack_descriptions() {
        assert_eq!(describe_ack("STARTED"), "Logging STARTED");
        assert_eq!(describe_ack("TRIP_RESET_COMPLETE"), "Trip RESET complete");
        assert_eq!(describe_ack("time_sync_complete"), "Time SYNC complete");
        assert_eq!(describe_ack("VIEW_CHANGED"), "ACK: VIEW_CHANGED");

        assert_eq!(ack_effect("TRIP_RESET_COMPLETE"), Some(AckEffect::TripReset));
        assert_eq!(ack_effect("ODO_RESET"), Some(AckEffect::OdometerReset));
        assert_eq!(ack_effect("TIME_SYNC_COMPLETE"), Some(AckEffect::TimeSynced));
        assert_eq!(ack_effect("STARTED"), None);
    }
}
