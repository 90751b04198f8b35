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

//! Event processing for link subscribers.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bluetooth::LinkEvent;
use crate::state::AppState;

/// Mirrors link events into [`AppState`] and renders console output.
pub struct EventProcessor {
    state: Arc<AppState>,
    /// Print every telemetry snapshot as a JSON line.
    json_telemetry: bool,
}

impl EventProcessor {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            json_telemetry: false,
        }
    }

    pub fn with_json_telemetry(mut self, enabled: bool) -> Self {
        self.json_telemetry = enabled;
        self
    }

    /// Process a single event, returning the console line to show, if any.
    pub fn process_event(&mut self, event: LinkEvent) -> Result<Option<String>> {
        let output = match event {
            LinkEvent::StateChanged(state) => {
                debug!("Link state changed: {}", state);
                self.state.set_state(state);
                Some(format!("[state] {}", state))
            }
            LinkEvent::DeviceConnected { device_name } => {
                info!("Device connected: {}", device_name);
                self.state.set_connected(device_name);
                None
            }
            LinkEvent::TelemetryUpdated(snapshot) => {
                let line = if self.json_telemetry {
                    Some(serde_json::to_string(&snapshot)?)
                } else {
                    None
                };
                self.state.set_telemetry(snapshot);
                line
            }
            LinkEvent::TimeUpdated { hour, minute } => {
                debug!("Device clock: {:02}:{:02}", hour, minute);
                None
            }
            LinkEvent::BatteryUpdated(volts) => {
                if volts < 3.3 {
                    warn!("Logger battery low: {:.2} V", volts);
                }
                None
            }
            LinkEvent::Message(text) => {
                info!("{}", text);
                self.state.set_last_message(text.clone());
                Some(text)
            }
            LinkEvent::Error(reason) => {
                error!("Link error: {}", reason);
                self.state.set_error(reason.clone());
                Some(format!("[error] {}", reason))
            }
            LinkEvent::Disconnected { reason } => {
                info!("Device disconnected: {}", reason);
                None
            }
        };
        Ok(output)
    }

    /// Drain `events` until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<LinkEvent>) {
        while let Some(event) = events.recv().await {
            match self.process_event(event) {
                Ok(Some(line)) => println!("{}", line),
                Ok(None) => {}
                Err(e) => error!("Error processing link event: {}", e),
            }
        }
        debug!("Event processor stopped");
    }
}
