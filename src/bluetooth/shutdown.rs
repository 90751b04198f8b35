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

//! Cooperative teardown of an established link.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Why an established link went down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The application asked for it.
    Requested,
    /// The device closed the stream.
    PeerClosed,
    /// A read or write failed.
    Io(String),
    /// The device stopped talking.
    LivenessTimeout,
}

impl DisconnectReason {
    /// Whether this reason is reported as an error.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Requested)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "Disconnected by request"),
            Self::PeerClosed => write!(f, "Connection closed by device"),
            Self::Io(reason) => write!(f, "Connection lost: {}", reason),
            Self::LivenessTimeout => write!(f, "Connection timeout (LivenessTimeout)"),
        }
    }
}

/// Shared by every task of one link.
///
/// The first caller of [`ShutdownSignal::trigger`] decides the reason;
/// later triggers only observe that teardown is already underway.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    reason: Arc<Mutex<Option<DisconnectReason>>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request teardown. Returns `true` if this call set the reason.
    pub fn trigger(&self, reason: DisconnectReason) -> bool {
        let first = {
            let mut slot = self.reason.lock();
            if slot.is_some() {
                false
            } else {
                *slot = Some(reason.clone());
                true
            }
        };

        if first {
            debug!("Link shutdown triggered: {}", reason);
        }
        self.token.cancel();
        first
    }

    /// Whether teardown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason recorded by the first trigger.
    pub fn reason(&self) -> Option<DisconnectReason> {
        self.reason.lock().clone()
    }

    /// Resolves once teardown has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
