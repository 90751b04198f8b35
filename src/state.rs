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

//! Application state management.
//!
//! Subscriber-side mirror of what the link session reports.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::bluetooth::{ConnectionState, TelemetrySnapshot};

/// Shared application state.
#[derive(Debug, Default)]
pub struct AppState {
    /// Last reported connection state.
    pub connection_state: RwLock<ConnectionState>,

    /// Connected device name.
    pub connected_device: RwLock<Option<String>>,

    /// Latest telemetry copy.
    pub telemetry: RwLock<TelemetrySnapshot>,

    /// Last informational message.
    pub last_message: RwLock<Option<String>>,

    /// Last error reason.
    pub last_error: RwLock<Option<String>>,
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.connection_state.write() = state;
        if state != ConnectionState::Connected {
            *self.connected_device.write() = None;
        }
    }

    pub fn set_connected(&self, device_name: String) {
        *self.connected_device.write() = Some(device_name);
        *self.last_error.write() = None;
    }

    pub fn set_telemetry(&self, snapshot: TelemetrySnapshot) {
        *self.telemetry.write() = snapshot;
    }

    pub fn set_last_message(&self, text: String) {
        *self.last_message.write() = Some(text);
    }

    pub fn set_error(&self, reason: String) {
        *self.last_error.write() = Some(reason);
    }

    pub fn get_state(&self) -> ConnectionState {
        *self.connection_state.read()
    }

    pub fn get_device_name(&self) -> Option<String> {
        self.connected_device.read().clone()
    }

    pub fn get_telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.read().clone()
    }

    pub fn get_last_message(&self) -> Option<String> {
        self.last_message.read().clone()
    }

    pub fn get_last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// One-line summary for the console.
    pub fn status_line(&self) -> String {
        let telemetry = self.telemetry.read();
        match self.get_device_name() {
            Some(device) => format!(
                "{} to {} | {} | {:.1} km/h | odo {:.1} m | trip {:.1} m | bat {:.2} V | packets {}",
                self.get_state(),
                device,
                telemetry.system_state.as_str(),
                telemetry.speed_kmh,
                telemetry.odometer_m,
                telemetry.trip_distance_m,
                telemetry.battery_voltage,
                telemetry.packet_count,
            ),
            None => format!("{}", self.get_state()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaving_connected_clears_device() {
        let state = AppState::new();
        state.set_state(ConnectionState::Connected);
        state.set_connected("RoadsenseLogger-v2.4".to_string());
        assert!(state.status_line().starts_with("connected to RoadsenseLogger-v2.4"));

        state.set_state(ConnectionState::Disconnected);
        assert_eq!(state.get_device_name(), None);
        assert_eq!(state.status_line(), "disconnected");
    }

    #[test]
    fn test_connect_clears_stale_error() {
        let state = AppState::new();
        state.set_error("Connection timeout".to_string());
        state.set_connected("RoadsenseLogger".to_string());
        assert_eq!(state.get_last_error(), None);
    }
}
