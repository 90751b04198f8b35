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

//! Error types for the logger link.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`LinkError`].
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Errors produced by the link session and its codec.
///
/// Connect-time variants end a connection attempt, `IoFailure` and
/// `LivenessTimeout` end an established link. `FrameOverflow` and
/// `DecodeSkipped` are absorbed locally and only ever logged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    /// No Bluetooth adapter, or the adapter is powered off.
    #[error("Bluetooth not available: {0}")]
    TransportUnavailable(String),

    /// The platform refused access to the radio.
    #[error("Bluetooth permission denied: {0}")]
    PermissionDenied(String),

    /// No paired device matches the configured name markers.
    #[error("Logger not found among paired devices (looking for {markers:?})")]
    DeviceNotFound { markers: Vec<String> },

    /// Socket establishment did not finish in time.
    #[error("Connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Read or write failed on an open stream.
    #[error("I/O failure: {0}")]
    IoFailure(String),

    /// A command was issued while the link is not connected.
    #[error("Not connected")]
    NotConnected,

    /// An unterminated line grew past the configured bound.
    #[error("Frame overflow: discarded {dropped} unterminated bytes")]
    FrameOverflow { dropped: usize },

    /// A single telemetry field could not be used.
    #[error("Skipped field {key}={value}")]
    DecodeSkipped { key: String, value: String },

    /// The peer stayed silent past the liveness deadline.
    #[error("Link timed out after {0:?} without data")]
    LivenessTimeout(Duration),

    /// The command cannot be put on the wire.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl LinkError {
    /// Whether this error ends a connection attempt.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::TransportUnavailable(_)
                | Self::PermissionDenied(_)
                | Self::DeviceNotFound { .. }
                | Self::ConnectTimeout(_)
                | Self::IoFailure(_)
        )
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            _ => Self::IoFailure(err.to_string()),
        }
    }
}
