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

//! Bluetooth communication module.
//!
//! Serial link to the road-survey logger: framing, decoding, command
//! delivery, liveness, and the session state machine.

#[cfg(feature = "bluez")]
mod bluez;
mod connection;
mod dispatcher;
mod liveness;
mod memory;
mod protocol;
mod reader;
mod shutdown;
mod telemetry;
mod transport;

#[cfg(feature = "bluez")]
pub use bluez::{BluezTransport, SPP_UUID};
pub use connection::{ConnectionState, LinkEvent, LinkSession};
pub use dispatcher::{run_writer, CommandDispatcher, CommandQueue, DEFAULT_COMMAND_SPACING};
pub use liveness::{LivenessMonitor, LivenessPolicy, LivenessVerdict};
pub use memory::{MemoryTransport, OpenBehavior};
pub use protocol::{
    ack_effect, describe_ack, AckEffect, Command, InboundMessage, TelemetryDecoder,
    LINE_TERMINATOR, TIME_FORMAT,
};
pub use reader::{FrameReader, Lines, DEFAULT_MAX_LINE_BYTES};
pub use shutdown::{DisconnectReason, ShutdownSignal};
pub use telemetry::{
    OdometerRebase, SystemState, TelemetrySnapshot, TelemetryUpdate, MAX_VIEW_MODE,
};
pub use transport::{select_device, LinkIo, LinkStream, PairedDevice, Transport};
