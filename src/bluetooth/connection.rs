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

//! Link session: connection state machine and per-link tasks.
//!
//! While connected, four tasks serve one link:
//!
//! ```text
//! reader     stream ─► FrameReader ─► TelemetryDecoder ─► events
//! writer     CommandQueue ─► stream
//! liveness   silence checks, PING probes
//! supervisor waits for shutdown, joins the others, finalizes Disconnected
//! ```
//!
//! Any of them may trigger the link's [`ShutdownSignal`]; only the
//! supervisor moves the state to `Disconnected`, after the stream halves
//! have been dropped.

use chrono::Local;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::dispatcher::{run_writer, CommandDispatcher};
use super::liveness::{LivenessMonitor, LivenessPolicy};
use super::protocol::{
    ack_effect, describe_ack, AckEffect, Command, InboundMessage, TelemetryDecoder, TIME_FORMAT,
};
use super::reader::FrameReader;
use super::shutdown::{DisconnectReason, ShutdownSignal};
use super::telemetry::TelemetrySnapshot;
use super::transport::{select_device, LinkStream, PairedDevice, Transport};
use crate::config::Config;
use crate::error::{LinkError, Result};

/// State of the link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    /// Whether the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Failed, Connecting)
                | (Connecting, Connected)
                | (Connecting, Failed)
                | (Connected, Disconnected)
                | (Disconnected, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events delivered to the subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    StateChanged(ConnectionState),
    DeviceConnected { device_name: String },
    TelemetryUpdated(TelemetrySnapshot),
    /// A telemetry line carried a valid device clock.
    TimeUpdated { hour: u8, minute: u8 },
    BatteryUpdated(f32),
    /// Informational text.
    Message(String),
    /// Short human-readable failure reason.
    Error(String),
    /// Follows `StateChanged(Disconnected)`.
    Disconnected { reason: DisconnectReason },
}

/// The link currently served by the per-link tasks.
struct ActiveLink {
    device: PairedDevice,
    dispatcher: CommandDispatcher,
    signal: ShutdownSignal,
    /// Flips to `true` once the supervisor has finalized the teardown.
    done: watch::Receiver<bool>,
}

struct SessionInner {
    config: Config,
    transport: Arc<dyn Transport>,
    state: RwLock<ConnectionState>,
    snapshot: RwLock<TelemetrySnapshot>,
    active: Mutex<Option<ActiveLink>>,
    /// Serializes connect attempts.
    connect_lock: tokio::sync::Mutex<()>,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
}

/// Manages one Bluetooth serial link to the logger.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct LinkSession {
    inner: Arc<SessionInner>,
}

impl LinkSession {
    /// Create a disconnected session publishing to `event_tx`.
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        event_tx: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                transport,
                state: RwLock::new(ConnectionState::Disconnected),
                snapshot: RwLock::new(TelemetrySnapshot::default()),
                active: Mutex::new(None),
                connect_lock: tokio::sync::Mutex::new(()),
                event_tx,
            }),
        }
    }

    /// Connect to the first paired device matching a configured marker.
    ///
    /// Failures are reported once as an `Error` event and returned. A
    /// request while already connecting or connected does nothing; a link
    /// that is already shutting down is waited for first.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;
        let inner = &self.inner;

        let closing = inner
            .active
            .lock()
            .as_ref()
            .filter(|link| link.signal.is_triggered())
            .map(|link| link.done.clone());
        if let Some(mut done) = closing {
            debug!("Waiting for the previous link to close");
            if done.wait_for(|finished| *finished).await.is_err() {
                warn!("Link supervisor went away before finishing teardown");
            }
        }

        let current = inner.state();
        if matches!(
            current,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            warn!("Connect ignored: link is {}", current);
            return Ok(());
        }

        let devices = match inner.transport.paired_devices().await {
            Ok(devices) => devices,
            Err(e) => return Err(inner.fail(e)),
        };

        let markers = &inner.config.link.device_markers;
        let device = match select_device(&devices, markers) {
            Some(device) => device.clone(),
            None => {
                let e = LinkError::DeviceNotFound {
                    markers: markers.clone(),
                };
                warn!("{}", e);
                inner.emit(LinkEvent::Error(e.to_string()));
                return Err(e);
            }
        };

        inner.transition(ConnectionState::Connecting);
        inner.emit(LinkEvent::Message(format!(
            "Connecting to {}...",
            device.name
        )));

        let timeout = inner.config.link.connect_timeout();
        let stream = match tokio::time::timeout(timeout, inner.transport.open(&device)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(inner.fail(e)),
            Err(_) => return Err(inner.fail(LinkError::ConnectTimeout(timeout))),
        };

        self.establish(device, stream);
        Ok(())
    }

    /// Tear the link down and wait until it is fully closed.
    ///
    /// A no-op when no link is up; concurrent callers all wait for the
    /// same teardown.
    pub async fn disconnect(&self) {
        let link = self
            .inner
            .active
            .lock()
            .as_ref()
            .map(|link| (link.signal.clone(), link.done.clone()));

        let Some((signal, mut done)) = link else {
            debug!("Disconnect ignored: no active link");
            return;
        };

        signal.trigger(DisconnectReason::Requested);
        if done.wait_for(|finished| *finished).await.is_err() {
            warn!("Link supervisor went away before finishing teardown");
        }
    }

    /// Release the link at application exit.
    pub async fn shutdown(&self) {
        info!("Shutting down link session");
        self.disconnect().await;
    }

    /// Queue a command for the connected device.
    pub fn enqueue(&self, command: Command) -> Result<()> {
        if self.inner.state() != ConnectionState::Connected {
            return Err(LinkError::NotConnected);
        }

        let dispatcher = self
            .inner
            .active
            .lock()
            .as_ref()
            .filter(|link| !link.signal.is_triggered())
            .map(|link| link.dispatcher.clone())
            .ok_or(LinkError::NotConnected)?;

        self.inner.submit(&dispatcher, command)
    }

    /// Queue a free-form token, validated for the wire.
    pub fn send_raw(&self, token: &str) -> Result<()> {
        self.enqueue(Command::raw(token)?)
    }

    pub fn start_logging(&self) -> Result<()> {
        self.enqueue(Command::Start)
    }

    pub fn stop_logging(&self) -> Result<()> {
        self.enqueue(Command::Stop)
    }

    pub fn pause_logging(&self) -> Result<()> {
        self.enqueue(Command::Pause)
    }

    pub fn resume_logging(&self) -> Result<()> {
        self.enqueue(Command::Resume)
    }

    pub fn reset_trip(&self) -> Result<()> {
        self.enqueue(Command::ResetTrip)
    }

    pub fn reset_odometer(&self) -> Result<()> {
        self.enqueue(Command::ResetOdometer)
    }

    pub fn reset_max_speed(&self) -> Result<()> {
        self.enqueue(Command::ResetMaxSpeed)
    }

    pub fn next_view(&self) -> Result<()> {
        self.enqueue(Command::NextView)
    }

    pub fn prev_view(&self) -> Result<()> {
        self.enqueue(Command::PrevView)
    }

    pub fn set_view(&self, view: u8) -> Result<()> {
        self.enqueue(Command::set_view(view)?)
    }

    pub fn set_wheel_circumference(&self, circumference: f32) -> Result<()> {
        self.enqueue(Command::set_wheel(circumference)?)
    }

    pub fn calibrate_mpu(&self) -> Result<()> {
        self.enqueue(Command::CalibrateMpu)
    }

    pub fn request_status(&self) -> Result<()> {
        self.enqueue(Command::Status)
    }

    pub fn request_data(&self) -> Result<()> {
        self.enqueue(Command::GetData)
    }

    pub fn request_time(&self) -> Result<()> {
        self.enqueue(Command::GetTime)
    }

    pub fn ping(&self) -> Result<()> {
        self.enqueue(Command::Ping)
    }

    /// Send the local wall clock as `TIME=...`.
    pub fn sync_time(&self) -> Result<()> {
        let now = Local::now();
        self.enqueue(Command::set_time(now))?;
        self.inner.emit(LinkEvent::Message(format!(
            "Syncing time: {}",
            now.format(TIME_FORMAT)
        )));
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Copy of the current telemetry.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.inner.snapshot.read().clone()
    }

    /// Lines recognized on the current link.
    pub fn packet_count(&self) -> u64 {
        self.inner.snapshot.read().packet_count
    }

    /// Commands queued but not yet written.
    pub fn queued_commands(&self) -> usize {
        self.inner
            .active
            .lock()
            .as_ref()
            .map(|link| link.dispatcher.pending_count())
            .unwrap_or(0)
    }

    /// Name of the device on the active link.
    pub fn connected_device(&self) -> Option<String> {
        self.inner
            .active
            .lock()
            .as_ref()
            .map(|link| link.device.name.clone())
    }

    /// Names of all paired devices.
    pub async fn available_devices(&self) -> Result<Vec<String>> {
        let devices = self.inner.transport.paired_devices().await?;
        Ok(devices.into_iter().map(|device| device.name).collect())
    }

    /// Whether a paired device matches a configured marker.
    pub async fn is_device_available(&self) -> bool {
        match self.inner.transport.paired_devices().await {
            Ok(devices) => {
                select_device(&devices, &self.inner.config.link.device_markers).is_some()
            }
            Err(e) => {
                debug!("Device lookup failed: {}", e);
                false
            }
        }
    }

    /// Enter Connected and start the per-link tasks.
    fn establish(&self, device: PairedDevice, stream: LinkStream) {
        let inner = &self.inner;
        let (read_half, write_half) = tokio::io::split(stream);
        let (dispatcher, queue) = CommandDispatcher::new();
        let signal = ShutdownSignal::new();
        let monitor = LivenessMonitor::new(LivenessPolicy::from(&inner.config.liveness));
        let (done_tx, done_rx) = watch::channel(false);

        {
            let mut snapshot = inner.snapshot.write();
            snapshot.bt_connected = true;
            snapshot.packet_count = 0;
            snapshot.rebase_odometer();
        }

        *inner.active.lock() = Some(ActiveLink {
            device: device.clone(),
            dispatcher: dispatcher.clone(),
            signal: signal.clone(),
            done: done_rx,
        });

        info!("Connected to {} ({})", device.name, device.address);
        inner.transition(ConnectionState::Connected);
        inner.emit(LinkEvent::DeviceConnected {
            device_name: device.name.clone(),
        });
        inner.emit(LinkEvent::Message(format!("Connected to {}", device.name)));

        let reader = tokio::spawn(read_loop(
            inner.clone(),
            read_half,
            monitor.clone(),
            dispatcher.clone(),
            signal.clone(),
        ));

        let events = inner.event_tx.clone();
        let writer = tokio::spawn(run_writer(
            queue,
            write_half,
            inner.config.link.command_spacing(),
            signal.clone(),
            move |command: &Command| {
                let _ = events.send(LinkEvent::Message(format!("Sent: {}", command)));
            },
        ));

        let liveness = tokio::spawn(monitor.run(dispatcher, signal.clone()));

        tokio::spawn(supervise(
            inner.clone(),
            signal,
            vec![reader, writer, liveness],
            done_tx,
        ));

        if let Err(e) = self.sync_time() {
            warn!("Initial time sync not queued: {}", e);
        }
    }
}

impl SessionInner {
    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn emit(&self, event: LinkEvent) {
        if self.event_tx.send(event).is_err() {
            trace!("No subscriber for link events");
        }
    }

    /// The only place the connection state changes.
    ///
    /// Returns `false` for a repeated or disallowed transition. The event
    /// is sent under the lock so subscribers see transitions in order.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.write();
        if *state == next {
            return false;
        }
        if !state.can_transition_to(next) {
            warn!("Ignoring invalid transition {} -> {}", *state, next);
            return false;
        }

        info!("Link state: {} -> {}", *state, next);
        *state = next;
        self.emit(LinkEvent::StateChanged(next));
        true
    }

    /// Report a failed connect attempt and enter Failed.
    fn fail(&self, e: LinkError) -> LinkError {
        error!("Connect failed: {}", e);
        self.transition(ConnectionState::Failed);
        self.emit(LinkEvent::Error(e.to_string()));
        e
    }

    fn submit(&self, dispatcher: &CommandDispatcher, command: Command) -> Result<()> {
        let syncs_time = matches!(command, Command::SetTime(_) | Command::Sync);
        let resets_odometer = command == Command::ResetOdometer;
        dispatcher.enqueue(command)?;
        if syncs_time {
            self.snapshot.write().time_sync_pending = true;
        }
        if resets_odometer {
            self.snapshot.write().expect_odometer_reset();
        }
        Ok(())
    }

    /// Answer a device-initiated time sync request.
    fn answer_time_request(&self, dispatcher: &CommandDispatcher) {
        let now = Local::now();
        match self.submit(dispatcher, Command::set_time(now)) {
            Ok(()) => self.emit(LinkEvent::Message(format!(
                "Syncing time: {}",
                now.format(TIME_FORMAT)
            ))),
            Err(e) => debug!("Time sync reply not queued: {}", e),
        }
    }

    /// Route one framed line.
    fn handle_line(
        &self,
        decoder: &mut TelemetryDecoder,
        monitor: &LivenessMonitor,
        dispatcher: &CommandDispatcher,
        line: &str,
    ) {
        let message = decoder.decode(line);
        if !message.is_recognized() {
            debug!("Ignoring unrecognized line: {}", line);
            return;
        }

        debug!("<< {}", line);
        monitor.record_activity();
        self.snapshot.write().packet_count = decoder.packet_count();

        match message {
            InboundMessage::Telemetry(update) => {
                let snapshot = {
                    let mut snapshot = self.snapshot.write();
                    snapshot.apply(&update);
                    snapshot.clone()
                };

                if update.time_valid == Some(true) {
                    self.emit(LinkEvent::TimeUpdated {
                        hour: snapshot.hour,
                        minute: snapshot.minute,
                    });
                }
                if let Some(volts) = update.battery_voltage.filter(|v| *v > 0.0) {
                    self.emit(LinkEvent::BatteryUpdated(volts));
                }
                self.emit(LinkEvent::TelemetryUpdated(snapshot));
            }
            InboundMessage::Acknowledgement(text) => {
                info!("Device acknowledged: {}", text);
                if let Some(effect) = ack_effect(&text) {
                    let snapshot = {
                        let mut snapshot = self.snapshot.write();
                        match effect {
                            AckEffect::TripReset => snapshot.reset_trip(),
                            AckEffect::OdometerReset => snapshot.reset_odometer(),
                            AckEffect::TimeSynced => snapshot.time_sync_pending = false,
                        }
                        snapshot.clone()
                    };
                    self.emit(LinkEvent::TelemetryUpdated(snapshot));
                }
                self.emit(LinkEvent::Message(describe_ack(&text)));
            }
            InboundMessage::ErrorNotice(text) => {
                warn!("Device reported error: {}", text);
                self.emit(LinkEvent::Error(format!("Device error: {}", text)));
            }
            InboundMessage::TimeSyncRequest => {
                info!("Device requested time sync");
                self.answer_time_request(dispatcher);
            }
            InboundMessage::TimeResponse(text) => {
                self.emit(LinkEvent::Message(format!("RTC Time: {}", text)));
            }
            InboundMessage::Status(text) => {
                self.emit(LinkEvent::Message(format!("Status: {}", text)));
            }
            InboundMessage::Battery(volts) => {
                self.snapshot.write().battery_voltage = volts;
                self.emit(LinkEvent::BatteryUpdated(volts));
            }
            InboundMessage::Unrecognized(_) => {}
        }
    }

    /// Final step of every teardown; runs once per link.
    fn finish_disconnect(&self, reason: DisconnectReason) {
        let link = self.active.lock().take();
        let snapshot = {
            let mut snapshot = self.snapshot.write();
            snapshot.mark_link_down();
            snapshot.clone()
        };

        if let Some(link) = &link {
            info!("Link to {} closed: {}", link.device.name, reason);
        }
        if reason.is_failure() {
            self.emit(LinkEvent::Error(reason.to_string()));
        }

        self.transition(ConnectionState::Disconnected);
        self.emit(LinkEvent::Disconnected { reason });
        self.emit(LinkEvent::Message("Disconnected".to_string()));
        self.emit(LinkEvent::TelemetryUpdated(snapshot));
    }
}

async fn read_loop(
    inner: Arc<SessionInner>,
    mut reader: ReadHalf<LinkStream>,
    monitor: LivenessMonitor,
    dispatcher: CommandDispatcher,
    signal: ShutdownSignal,
) {
    let link = &inner.config.link;
    let mut frames = FrameReader::with_max_line_bytes(link.max_line_bytes);
    let mut decoder = TelemetryDecoder::new();
    let mut buf = vec![0u8; link.read_buffer_bytes.max(1)];

    debug!("Read loop started");

    loop {
        let read = tokio::select! {
            biased;
            _ = signal.cancelled() => break,
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                info!("Connection closed by device");
                signal.trigger(DisconnectReason::PeerClosed);
                break;
            }
            Ok(n) => {
                for line in frames.push(&buf[..n]) {
                    if signal.is_triggered() {
                        break;
                    }
                    match line {
                        Ok(line) => {
                            inner.handle_line(&mut decoder, &monitor, &dispatcher, &line)
                        }
                        Err(e) => debug!("{}", e),
                    }
                }
            }
            Err(e) => {
                if !signal.is_triggered() {
                    error!("Read failed: {}", e);
                    signal.trigger(DisconnectReason::Io(format!("read failed: {}", e)));
                }
                break;
            }
        }
    }

    debug!("Read loop stopped");
}

/// Wait for the link to shut down, then finalize it.
///
/// The state only becomes `Disconnected` after every task has exited and
/// dropped its half of the stream.
async fn supervise(
    inner: Arc<SessionInner>,
    signal: ShutdownSignal,
    tasks: Vec<JoinHandle<()>>,
    done: watch::Sender<bool>,
) {
    signal.cancelled().await;

    for task in tasks {
        if let Err(e) = task.await {
            error!("Link task ended abnormally: {}", e);
        }
    }

    let reason = signal.reason().unwrap_or(DisconnectReason::Requested);
    inner.finish_disconnect(reason);
    let _ = done.send(true);
}
