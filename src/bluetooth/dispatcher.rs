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

//! Serialized delivery of outbound commands.
//!
//! Callers push into an unbounded channel; a single writer task drains it
//! and owns the write half of the stream, so two commands never interleave
//! on the wire.
//!
//! ```text
//! enqueue() ─┐
//! liveness  ─┼─► mpsc ─► writer task ─► stream
//! reader    ─┘
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::protocol::Command;
use super::shutdown::{DisconnectReason, ShutdownSignal};
use crate::error::LinkError;

/// Pause after each command so the logger MCU can keep up.
pub const DEFAULT_COMMAND_SPACING: Duration = Duration::from_millis(100);

/// Handle for queueing commands on one link.
///
/// Cheap to clone; every clone feeds the same writer.
#[derive(Clone)]
pub struct CommandDispatcher {
    tx: mpsc::UnboundedSender<Command>,
    pending: Arc<AtomicUsize>,
}

/// Receiving side, consumed by [`run_writer`].
pub struct CommandQueue {
    rx: mpsc::UnboundedReceiver<Command>,
    pending: Arc<AtomicUsize>,
}

impl CommandDispatcher {
    /// Create a dispatcher and the queue its writer drains.
    pub fn new() -> (Self, CommandQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                pending: pending.clone(),
            },
            CommandQueue { rx, pending },
        )
    }

    /// Append a command to the queue.
    ///
    /// Fails with `NotConnected` once the writer has gone away.
    pub fn enqueue(&self, command: Command) -> Result<(), LinkError> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.send(command).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            LinkError::NotConnected
        })
    }

    /// Commands queued but not yet written.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether the writer is still accepting commands.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl CommandQueue {
    /// Take the next queued command without writing it.
    pub fn try_next(&mut self) -> Option<Command> {
        let command = self.rx.try_recv().ok()?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        Some(command)
    }
}

/// Drain the queue onto `writer`, one command at a time.
///
/// Stops when the link shuts down or every dispatcher is dropped. A write
/// failure triggers link shutdown instead of retrying. Commands still
/// queued at exit are discarded.
pub async fn run_writer<W, F>(
    queue: CommandQueue,
    mut writer: W,
    spacing: Duration,
    signal: ShutdownSignal,
    mut on_sent: F,
) where
    W: AsyncWrite + Unpin,
    F: FnMut(&Command),
{
    let CommandQueue { mut rx, pending } = queue;

    loop {
        let command = tokio::select! {
            biased;
            _ = signal.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let written = tokio::select! {
            biased;
            _ = signal.cancelled() => break,
            result = write_command(&mut writer, &command) => result,
        };
        pending.fetch_sub(1, Ordering::AcqRel);

        if let Err(e) = written {
            error!("Send failed for {}: {}", command, e);
            signal.trigger(DisconnectReason::Io(format!("send failed: {}", e)));
            break;
        }

        debug!(">> {}", command);
        on_sent(&command);

        tokio::select! {
            biased;
            _ = signal.cancelled() => break,
            _ = tokio::time::sleep(spacing) => {}
        }
    }

    rx.close();
    let mut discarded = 0;
    while rx.try_recv().is_ok() {
        discarded += 1;
    }
    pending.store(0, Ordering::Release);
    if discarded > 0 {
        debug!("Discarded {} queued commands on teardown", discarded);
    }
}

async fn write_command<W>(writer: &mut W, command: &Command) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&command.encode()).await?;
    writer.flush().await
}
