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

//! BlueZ RFCOMM client transport.

use async_trait::async_trait;
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Address, ErrorKind};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::transport::{LinkStream, PairedDevice, Transport};
use crate::error::{LinkError, Result};

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Client side of the serial port profile on the default adapter.
pub struct BluezTransport {
    adapter: bluer::Adapter,
    channel: u8,
}

impl BluezTransport {
    /// Open a BlueZ session on the default adapter.
    pub async fn new(channel: u8) -> Result<Self> {
        let session = bluer::Session::new().await.map_err(unavailable)?;
        debug!("BlueZ session created");

        let adapter = session.default_adapter().await.map_err(unavailable)?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        Ok(Self { adapter, channel })
    }

    async fn ensure_powered(&self) -> Result<()> {
        if self.adapter.is_powered().await.map_err(map_bluer_error)? {
            Ok(())
        } else {
            Err(LinkError::TransportUnavailable(format!(
                "adapter {} is powered off",
                self.adapter.name()
            )))
        }
    }
}

#[async_trait]
impl Transport for BluezTransport {
    async fn paired_devices(&self) -> Result<Vec<PairedDevice>> {
        self.ensure_powered().await?;

        let mut devices = Vec::new();
        for addr in self
            .adapter
            .device_addresses()
            .await
            .map_err(map_bluer_error)?
        {
            let device = self.adapter.device(addr).map_err(map_bluer_error)?;
            if device.is_paired().await.map_err(map_bluer_error)? {
                let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
                devices.push(PairedDevice::new(addr.to_string(), name));
            }
        }

        Ok(devices)
    }

    async fn open(&self, device: &PairedDevice) -> Result<LinkStream> {
        self.ensure_powered().await?;

        let address: Address = device
            .address
            .parse()
            .map_err(|_| LinkError::IoFailure(format!("invalid address {}", device.address)))?;

        let remote = self.adapter.device(address).map_err(map_bluer_error)?;
        match remote.uuids().await {
            Ok(Some(uuids)) if !uuids.contains(&SPP_UUID) => {
                warn!("{} does not advertise SPP ({})", device.name, SPP_UUID);
            }
            Ok(_) => {}
            Err(e) => debug!("Could not read service list of {}: {}", device.name, e),
        }

        info!(
            "Opening RFCOMM channel {} to {} ({})",
            self.channel, device.name, address
        );
        let stream = Stream::connect(SocketAddr::new(address, self.channel)).await?;
        Ok(Box::new(stream))
    }
}

fn unavailable(e: bluer::Error) -> LinkError {
    match map_bluer_error(e) {
        LinkError::IoFailure(reason) => LinkError::TransportUnavailable(reason),
        other => other,
    }
}

fn map_bluer_error(e: bluer::Error) -> LinkError {
    match e.kind {
        ErrorKind::NotAuthorized | ErrorKind::NotPermitted => {
            LinkError::PermissionDenied(e.message)
        }
        ErrorKind::NotReady | ErrorKind::NotAvailable => {
            LinkError::TransportUnavailable(e.message)
        }
        _ => LinkError::IoFailure(e.to_string()),
    }
}
