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

//! In-process transport backed by `tokio::io::duplex`.
//!
//! Every successful `open` hands the far end of a fresh duplex pipe to the
//! receiver returned by [`MemoryTransport::new`], which plays the logger.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::mpsc;
use tracing::debug;

use super::transport::{LinkStream, PairedDevice, Transport};
use crate::error::{LinkError, Result};

const PIPE_CAPACITY: usize = 4096;

/// How the next `open` call behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenBehavior {
    Accept,
    /// Never completes, like a device that is out of range.
    Hang,
    /// Fails with an I/O error of the given kind.
    Fail(io::ErrorKind),
    /// Adapter missing or powered off.
    Unavailable,
    PermissionDenied,
}

pub struct MemoryTransport {
    devices: Mutex<Vec<PairedDevice>>,
    behavior: Mutex<OpenBehavior>,
    peers: mpsc::UnboundedSender<DuplexStream>,
    writes_fail: Arc<AtomicBool>,
}

impl MemoryTransport {
    /// Create a transport listing `devices` as paired.
    pub fn new(devices: Vec<PairedDevice>) -> (Self, mpsc::UnboundedReceiver<DuplexStream>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        (
            Self {
                devices: Mutex::new(devices),
                behavior: Mutex::new(OpenBehavior::Accept),
                peers,
                writes_fail: Arc::new(AtomicBool::new(false)),
            },
            peer_rx,
        )
    }

    pub fn with_behavior(self, behavior: OpenBehavior) -> Self {
        *self.behavior.lock() = behavior;
        self
    }

    pub fn set_behavior(&self, behavior: OpenBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn set_devices(&self, devices: Vec<PairedDevice>) {
        *self.devices.lock() = devices;
    }

    /// Make writes on every open link fail with `BrokenPipe` while reads
    /// keep working.
    pub fn fail_writes(&self, fail: bool) {
        self.writes_fail.store(fail, Ordering::Release);
    }
}

/// Local end of an in-memory link.
struct MemoryLink {
    inner: DuplexStream,
    writes_fail: Arc<AtomicBool>,
}

impl AsyncRead for MemoryLink {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryLink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.writes_fail.load(Ordering::Acquire) {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "link write failed",
            )));
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn paired_devices(&self) -> Result<Vec<PairedDevice>> {
        if *self.behavior.lock() == OpenBehavior::Unavailable {
            return Err(LinkError::TransportUnavailable(
                "no adapter present".to_string(),
            ));
        }
        Ok(self.devices.lock().clone())
    }

    async fn open(&self, device: &PairedDevice) -> Result<LinkStream> {
        let behavior = self.behavior.lock().clone();
        debug!("Opening in-memory link to {} ({:?})", device.name, behavior);

        match behavior {
            OpenBehavior::Accept => {
                let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
                self.peers
                    .send(remote)
                    .map_err(|_| LinkError::IoFailure("peer side dropped".to_string()))?;
                Ok(Box::new(MemoryLink {
                    inner: local,
                    writes_fail: self.writes_fail.clone(),
                }))
            }
            OpenBehavior::Hang => std::future::pending().await,
            OpenBehavior::Fail(kind) => Err(io::Error::new(kind, "simulated failure").into()),
            OpenBehavior::Unavailable => Err(LinkError::TransportUnavailable(
                "no adapter present".to_string(),
            )),
            OpenBehavior::PermissionDenied => Err(LinkError::PermissionDenied(
                "connect permission not granted".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn logger() -> PairedDevice {
        PairedDevice::new("00:11:22:33:44:55", "RoadsenseLogger-v2.4")
    }

    #[tokio::test]
    async fn test_accept_hands_peer_end_over() {
        let (transport, mut peers) = MemoryTransport::new(vec![logger()]);

        let mut stream = transport.open(&logger()).await.unwrap();
        let mut peer = peers.recv().await.unwrap();

        stream.write_all(b"PING\n").await.unwrap();
        let mut buf = [0u8; 5];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PING\n");
    }

    #[tokio::test]
    async fn test_failed_writes_keep_reads() {
        let (transport, mut peers) = MemoryTransport::new(vec![logger()]);
        let mut stream = transport.open(&logger()).await.unwrap();
        let mut peer = peers.recv().await.unwrap();

        transport.fail_writes(true);
        let err = stream.write_all(b"START\n").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        peer.write_all(b"ACK:STARTED\n").await.unwrap();
        let mut buf = [0u8; 12];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ACK:STARTED\n");
    }

    #[tokio::test]
    async fn test_failure_modes() {
        let (transport, _peers) = MemoryTransport::new(vec![logger()]);

        transport.set_behavior(OpenBehavior::Fail(io::ErrorKind::ConnectionRefused));
        assert!(matches!(
            transport.open(&logger()).await,
            Err(LinkError::IoFailure(_))
        ));

        transport.set_behavior(OpenBehavior::PermissionDenied);
        assert!(matches!(
            transport.open(&logger()).await,
            Err(LinkError::PermissionDenied(_))
        ));

        transport.set_behavior(OpenBehavior::Unavailable);
        assert!(matches!(
            transport.paired_devices().await,
            Err(LinkError::TransportUnavailable(_))
        ));
    }
}
