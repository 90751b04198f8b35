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

//! Telemetry snapshot and partial updates.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Highest view index the logger display supports.
pub const MAX_VIEW_MODE: u8 = 5;

/// Logging state reported by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemState {
    #[default]
    Ready,
    Running,
    Stopped,
    Paused,
}

impl SystemState {
    /// Parse from the wire code (0-3).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Ready),
            1 => Some(Self::Running),
            2 => Some(Self::Stopped),
            3 => Some(Self::Paused),
            _ => None,
        }
    }

    /// Wire code for this state.
    pub fn code(&self) -> u8 {
        match self {
            Self::Ready => 0,
            Self::Running => 1,
            Self::Stopped => 2,
            Self::Paused => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Paused => "PAUSED",
        }
    }
}

/// How the next `ODO=` reading is checked against the current odometer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OdometerRebase {
    /// Readings below the current value are ignored.
    #[default]
    Monotonic,
    /// The next reading is taken as is. Armed when a new link comes up.
    NextReading,
    /// The next lower reading is taken. Armed when a reset was sent.
    NextDrop,
}

/// Fields carried by a single telemetry line.
///
/// `None` means the line did not carry a usable value for that field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryUpdate {
    pub speed_kmh: Option<f32>,
    pub odometer_m: Option<f32>,
    pub trip_distance_m: Option<f32>,
    pub max_speed_kmh: Option<f32>,
    pub avg_speed_kmh: Option<f32>,
    pub acceleration_z: Option<f32>,
    pub system_state: Option<SystemState>,
    /// Raw `TIME=` value as sent by the device.
    pub timestamp: Option<String>,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub time_valid: Option<bool>,
    pub battery_voltage: Option<f32>,
    pub view_mode: Option<u8>,
    pub data_streaming: Option<bool>,
    pub time_sync_pending: Option<bool>,
    /// Packet counter after this line was classified.
    pub packet_count: u64,
}

impl TelemetryUpdate {
    /// Whether no data field was decoded.
    pub fn is_empty(&self) -> bool {
        *self
            == Self {
                packet_count: self.packet_count,
                ..Self::default()
            }
    }
}

/// Latest merged view of the device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub speed_kmh: f32,
    pub odometer_m: f32,
    pub trip_distance_m: f32,
    pub max_speed_kmh: f32,
    pub avg_speed_kmh: f32,
    pub acceleration_z: f32,
    pub system_state: SystemState,
    pub packet_count: u64,
    pub timestamp: String,
    /// Volts, 0 when unknown.
    pub battery_voltage: f32,
    pub hour: u8,
    pub minute: u8,
    pub time_valid: bool,
    pub view_mode: u8,
    pub bt_connected: bool,
    pub data_streaming: bool,
    pub last_update: Option<DateTime<Local>>,
    pub time_sync_pending: bool,
    #[serde(skip)]
    pub odometer_rebase: OdometerRebase,
}

impl TelemetrySnapshot {
    /// Merge a partial update; absent fields keep their previous value.
    pub fn apply(&mut self, update: &TelemetryUpdate) {
        merge(&mut self.speed_kmh, update.speed_kmh);
        merge(&mut self.trip_distance_m, update.trip_distance_m);
        merge(&mut self.max_speed_kmh, update.max_speed_kmh);
        merge(&mut self.avg_speed_kmh, update.avg_speed_kmh);
        merge(&mut self.acceleration_z, update.acceleration_z);
        merge(&mut self.system_state, update.system_state);
        merge(&mut self.timestamp, update.timestamp.clone());
        merge(&mut self.hour, update.hour);
        merge(&mut self.minute, update.minute);
        merge(&mut self.time_valid, update.time_valid);
        merge(&mut self.battery_voltage, update.battery_voltage);
        merge(&mut self.view_mode, update.view_mode);
        merge(&mut self.data_streaming, update.data_streaming);
        merge(&mut self.time_sync_pending, update.time_sync_pending);

        if let Some(odometer) = update.odometer_m {
            self.merge_odometer(odometer);
        }

        self.packet_count = update.packet_count;
        self.last_update = Some(Local::now());
    }

    fn merge_odometer(&mut self, odometer: f32) {
        let regressed = odometer < self.odometer_m;
        if regressed && self.odometer_rebase == OdometerRebase::Monotonic {
            debug!(
                "Ignoring odometer regression {} -> {}",
                self.odometer_m, odometer
            );
            return;
        }

        if regressed {
            debug!("Odometer rebased {} -> {}", self.odometer_m, odometer);
        }
        if regressed || self.odometer_rebase == OdometerRebase::NextReading {
            self.odometer_rebase = OdometerRebase::Monotonic;
        }
        self.odometer_m = odometer;
    }

    /// Zero the odometer after the device confirmed a reset.
    pub fn reset_odometer(&mut self) {
        self.odometer_m = 0.0;
        self.odometer_rebase = OdometerRebase::Monotonic;
    }

    /// Accept the next lower `ODO=` reading; a reset has been requested.
    pub fn expect_odometer_reset(&mut self) {
        self.odometer_rebase = OdometerRebase::NextDrop;
    }

    /// Take the next `ODO=` reading as is; the device may have restarted.
    pub fn rebase_odometer(&mut self) {
        self.odometer_rebase = OdometerRebase::NextReading;
    }

    /// Zero the trip distance after the device confirmed a reset.
    pub fn reset_trip(&mut self) {
        self.trip_distance_m = 0.0;
    }

    /// Clear per-link flags when the link goes away.
    pub fn mark_link_down(&mut self) {
        self.bt_connected = false;
        self.data_streaming = false;
    }
}

fn merge<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_state_codes() {
        assert_eq!(SystemState::from_code(1), Some(SystemState::Running));
        assert_eq!(SystemState::from_code(3), Some(SystemState::Paused));
        assert_eq!(SystemState::from_code(4), None);
        assert_eq!(SystemState::Stopped.code(), 2);
        assert_eq!(SystemState::default(), SystemState::Ready);
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut snapshot = TelemetrySnapshot {
            speed_kmh: 40.0,
            battery_voltage: 3.8,
            view_mode: 2,
            ..Default::default()
        };

        let update = TelemetryUpdate {
            odometer_m: Some(1500.0),
            packet_count: 7,
            ..Default::default()
        };
        snapshot.apply(&update);

        assert_eq!(snapshot.odometer_m, 1500.0);
        assert_eq!(snapshot.speed_kmh, 40.0);
        assert_eq!(snapshot.battery_voltage, 3.8);
        assert_eq!(snapshot.view_mode, 2);
        assert_eq!(snapshot.packet_count, 7);
        assert!(snapshot.last_update.is_some());
    }

    #[test]
    fn test_odometer_never_regresses() {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.apply(&TelemetryUpdate {
            odometer_m: Some(250.0),
            ..Default::default()
        });
        snapshot.apply(&TelemetryUpdate {
            odometer_m: Some(10.0),
            ..Default::default()
        });
        assert_eq!(snapshot.odometer_m, 250.0);

        snapshot.reset_odometer();
        snapshot.apply(&TelemetryUpdate {
            odometer_m: Some(10.0),
            ..Default::default()
        });
        assert_eq!(snapshot.odometer_m, 10.0);
    }

    #[test]
    fn test_requested_reset_accepts_next_drop() {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.apply(&TelemetryUpdate {
            odometer_m: Some(120.5),
            ..Default::default()
        });

        snapshot.expect_odometer_reset();
        // Readings sent before the device handled the reset still count up.
        snapshot.apply(&TelemetryUpdate {
            odometer_m: Some(121.0),
            ..Default::default()
        });
        assert_eq!(snapshot.odometer_rebase, OdometerRebase::NextDrop);

        snapshot.apply(&TelemetryUpdate {
            odometer_m: Some(0.0),
            ..Default::default()
        });
        assert_eq!(snapshot.odometer_m, 0.0);
        assert_eq!(snapshot.odometer_rebase, OdometerRebase::Monotonic);

        snapshot.apply(&TelemetryUpdate {
            odometer_m: Some(30.0),
            ..Default::default()
        });
        snapshot.apply(&TelemetryUpdate {
            odometer_m: Some(20.0),
            ..Default::default()
        });
        assert_eq!(snapshot.odometer_m, 30.0);
    }

    #[test]
    fn test_rebase_takes_first_reading_only() {
        let mut snapshot = TelemetrySnapshot {
            odometer_m: 120.5,
            ..Default::default()
        };

        snapshot.rebase_odometer();
        snapshot.apply(&TelemetryUpdate {
            odometer_m: Some(5.0),
            ..Default::default()
        });
        assert_eq!(snapshot.odometer_m, 5.0);

        snapshot.apply(&TelemetryUpdate {
            odometer_m: Some(3.0),
            ..Default::default()
        });
        assert_eq!(snapshot.odometer_m, 5.0);

        snapshot.rebase_odometer();
        snapshot.apply(&TelemetryUpdate {
            odometer_m: Some(8.0),
            ..Default::default()
        });
        assert_eq!(snapshot.odometer_rebase, OdometerRebase::Monotonic);
    }

    #[test]
    fn test_update_emptiness() {
        let update = TelemetryUpdate {
            packet_count: 3,
            ..Default::default()
        };
        assert!(update.is_empty());

        let update = TelemetryUpdate {
            view_mode: Some(1),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = TelemetrySnapshot {
            system_state: SystemState::Paused,
            ..Default::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"system_state\":\"paused\""));
    }
}
