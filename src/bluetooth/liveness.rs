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

//! Inbound traffic watchdog.
//!
//! A quiet link is first probed with `PING`; only if it stays quiet past
//! the hard deadline is it torn down.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::dispatcher::CommandDispatcher;
use super::protocol::Command;
use super::shutdown::{DisconnectReason, ShutdownSignal};
use crate::config::LivenessConfig;
use crate::error::LinkError;

/// Outcome of a silence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessVerdict {
    Healthy,
    /// Quiet long enough to send a probe.
    Probe,
    /// Quiet past the hard deadline.
    Expired,
}

/// Timing policy for the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    pub check_interval: Duration,
    pub probe_after: Duration,
    pub probe_grace: Duration,
    pub timeout: Duration,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self::from(&LivenessConfig::default())
    }
}

impl From<&LivenessConfig> for LivenessPolicy {
    fn from(config: &LivenessConfig) -> Self {
        Self {
            check_interval: Duration::from_millis(config.check_interval_ms),
            probe_after: Duration::from_millis(config.probe_after_ms),
            probe_grace: Duration::from_millis(config.probe_grace_ms),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

impl LivenessPolicy {
    /// Classify a silence duration.
    pub fn assess(&self, silence: Duration) -> LivenessVerdict {
        if silence >= self.timeout {
            LivenessVerdict::Expired
        } else if silence >= self.probe_after {
            LivenessVerdict::Probe
        } else {
            LivenessVerdict::Healthy
        }
    }
}

/// Tracks the last inbound line of one link.
///
/// Clones share the same clock; the reader records, the watchdog task
/// reads.
#[derive(Clone)]
pub struct LivenessMonitor {
    last_seen: Arc<Mutex<Instant>>,
    policy: LivenessPolicy,
}

impl LivenessMonitor {
    /// Start tracking; the link counts as fresh right now.
    pub fn new(policy: LivenessPolicy) -> Self {
        Self {
            last_seen: Arc::new(Mutex::new(Instant::now())),
            policy,
        }
    }

    /// Note a successfully classified inbound line.
    pub fn record_activity(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound line.
    pub fn silence(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    pub fn assess(&self) -> LivenessVerdict {
        self.policy.assess(self.silence())
    }

    pub fn policy(&self) -> &LivenessPolicy {
        &self.policy
    }

    /// Watch the link until it shuts down.
    ///
    /// Probes with `PING` once the probe threshold passes, waits the grace
    /// period, and triggers shutdown with `LivenessTimeout` once a check
    /// finds the silence past the hard deadline. An expired link is not
    /// probed again.
    pub async fn run(self, dispatcher: CommandDispatcher, signal: ShutdownSignal) {
        debug!("Liveness monitor started");

        loop {
            tokio::select! {
                biased;
                _ = signal.cancelled() => break,
                _ = tokio::time::sleep(self.policy.check_interval) => {}
            }

            let verdict = self.assess();
            if verdict == LivenessVerdict::Healthy {
                continue;
            }

            if verdict == LivenessVerdict::Probe {
                warn!(
                    "No data received for {:?}, checking connection...",
                    self.silence()
                );
                if let Err(e) = dispatcher.enqueue(Command::Ping) {
                    debug!("Ping not queued: {}", e);
                }

                tokio::select! {
                    biased;
                    _ = signal.cancelled() => break,
                    _ = tokio::time::sleep(self.policy.probe_grace) => {}
                }
            }

            if self.assess() == LivenessVerdict::Expired {
                error!("{}", LinkError::LivenessTimeout(self.silence()));
                signal.trigger(DisconnectReason::LivenessTimeout);
                break;
            }
        }

        debug!("Liveness monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LivenessPolicy {
        LivenessPolicy {
            check_interval: Duration::from_secs(5),
            probe_after: Duration::from_secs(10),
            probe_grace: Duration::from_secs(2),
            timeout: Duration::from_secs(15),
        }
    }

    #[test]
    fn test_assess_thresholds() {
        let policy = policy();
        assert_eq!(policy.assess(Duration::from_secs(9)), LivenessVerdict::Healthy);
        assert_eq!(policy.assess(Duration::from_secs(10)), LivenessVerdict::Probe);
        assert_eq!(policy.assess(Duration::from_secs(14)), LivenessVerdict::Probe);
        assert_eq!(policy.assess(Duration::from_secs(15)), LivenessVerdict::Expired);
        assert_eq!(LivenessPolicy::default(), policy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_silence() {
        let monitor = LivenessMonitor::new(policy());
        tokio::time::advance(Duration::from_secs(12)).await;
        assert_eq!(monitor.assess(), LivenessVerdict::Probe);

        monitor.record_activity();
        assert_eq!(monitor.assess(), LivenessVerdict::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_link_probed_then_expired() {
        let monitor = LivenessMonitor::new(policy());
        let (dispatcher, mut queue) = CommandDispatcher::new();
        let signal = ShutdownSignal::new();
        let started = Instant::now();

        monitor.clone().run(dispatcher, signal.clone()).await;

        assert_eq!(signal.reason(), Some(DisconnectReason::LivenessTimeout));
        // Probed at 10s; still quiet after the grace, expired at the 17s check.
        assert_eq!(started.elapsed(), Duration::from_secs(17));
        assert_eq!(queue.try_next(), Some(Command::Ping));
        assert_eq!(queue.try_next(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chatty_link_survives() {
        let monitor = LivenessMonitor::new(policy());
        let (dispatcher, _queue) = CommandDispatcher::new();
        let signal = ShutdownSignal::new();

        let feeder = {
            let monitor = monitor.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    monitor.record_activity();
                }
            })
        };

        let watchdog = tokio::spawn(monitor.run(dispatcher.clone(), signal.clone()));
        feeder.await.unwrap();
        assert!(!signal.is_triggered());
        assert_eq!(dispatcher.pending_count(), 0);

        signal.trigger(DisconnectReason::Requested);
        watchdog.await.unwrap();
        assert_eq!(signal.reason(), Some(DisconnectReason::Requested));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_answered_in_grace() {
        let monitor = LivenessMonitor::new(policy());
        let (dispatcher, _queue) = CommandDispatcher::new();
        let signal = ShutdownSignal::new();

        let watchdog = tokio::spawn(monitor.clone().run(dispatcher.clone(), signal.clone()));

        // First probe goes out at 10s; the device answers at 11s.
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(dispatcher.pending_count(), 1);
        monitor.record_activity();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!signal.is_triggered());

        signal.trigger(DisconnectReason::Requested);
        watchdog.await.unwrap();
    }
}
