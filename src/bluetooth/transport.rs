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

//! Boundary between the link session and the platform Bluetooth stack.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// A paired Bluetooth device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedDevice {
    pub address: String,
    pub name: String,
}

impl PairedDevice {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

/// Byte stream of an open link.
pub trait LinkIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> LinkIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type LinkStream = Box<dyn LinkIo>;

/// Source of paired devices and serial streams.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Devices already bonded with the local adapter.
    async fn paired_devices(&self) -> Result<Vec<PairedDevice>>;

    /// Open a serial stream to `device`.
    ///
    /// May block for a long time; callers bound it with their own timeout.
    async fn open(&self, device: &PairedDevice) -> Result<LinkStream>;
}

/// First device whose name contains any of `markers`, ignoring case.
///
/// Devices are checked in the order given, so the transport's ordering
/// decides between several qualifying loggers.
pub fn select_device<'a>(
    devices: &'a [PairedDevice],
    markers: &[String],
) -> Option<&'a PairedDevice> {
    let markers: Vec<String> = markers.iter().map(|m| m.to_lowercase()).collect();
    devices.iter().find(|device| {
        let name = device.name.to_lowercase();
        markers.iter().any(|marker| name.contains(marker.as_str()))
    })
}
