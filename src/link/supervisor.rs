//! Connection supervision for the broker link.
//!
//! The supervisor keeps exactly two states, connected and disconnected, and
//! decides when a reconnect attempt may happen. Two policies exist: a
//! bounded blocking cycle with a fixed delay between attempts, and a
//! non-blocking pace of at most one attempt per interval. The gate itself is pure pacing state so it can be tested
//! with injected instants; all sleeping happens in the engine loop.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Liveness of the broker session, derived from the event loop.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Snapshot of link health, published over a watch channel for the panel.
#[derive(Clone, Debug, Default)]
pub struct LinkStatus {
    pub connection_state: ConnectionState,
    pub messages_sent: usize,
    pub messages_received: usize,
    /// Successful handshakes, the first connect included.
    pub connects: usize,
    pub last_activity: Option<DateTime<Local>>,
}

impl LinkStatus {
    pub fn touch(&mut self) {
        self.last_activity = Some(Local::now());
    }
}

/// Reconnect pacing policy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry with a fixed delay between attempts, giving up on the current
    /// cycle after `max_attempts` consecutive failures.
    Blocking {
        #[serde(with = "duration_millis")]
        delay: Duration,
        max_attempts: u32,
    },
    /// Attempt at most once per `min_interval`, never stalling the loop
    /// longer than the remaining wait.
    Interval {
        #[serde(with = "duration_millis")]
        min_interval: Duration,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Blocking {
            delay: Duration::from_secs(5),
            max_attempts: 12,
        }
    }
}

/// Serde helper storing durations as integer milliseconds in the TOML file.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(de)?;
        Ok(Duration::from_millis(millis))
    }
}

/// What the engine loop should do about the lost session right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    /// Sleep `pause`, then let the event loop attempt the handshake.
    Attempt { pause: Duration },
    /// Too early; stay idle for `remaining` before asking again.
    Defer { remaining: Duration },
    /// The bounded cycle is spent; surface an error, then start a new cycle.
    Exhausted,
    /// Session is live, nothing to do.
    Idle,
}

/// Pacing state for reconnect attempts.
pub struct ReconnectGate {
    policy: RetryPolicy,
    state: ConnectionState,
    last_attempt: Option<Instant>,
    failed_attempts: u32,
}

impl ReconnectGate {
    pub fn new(policy: RetryPolicy) -> Self {
        ReconnectGate {
            policy,
            state: ConnectionState::Disconnected,
            last_attempt: None,
            failed_attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed attempts in the current cycle.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Decides whether an attempt may happen at `now`. Only meaningful while
    /// disconnected; a live session always yields `Idle`.
    pub fn decide(&self, now: Instant) -> AttemptDecision {
        if self.state == ConnectionState::Connected {
            return AttemptDecision::Idle;
        }
        match self.policy {
            RetryPolicy::Blocking { delay, max_attempts } => {
                if self.failed_attempts >= max_attempts {
                    AttemptDecision::Exhausted
                } else if self.failed_attempts == 0 && self.last_attempt.is_none() {
                    // Nothing attempted since the session was lost; go out
                    // immediately. A fresh cycle after an exhausted one still
                    // pauses, keeping the cadence fixed across cycles.
                    AttemptDecision::Attempt {
                        pause: Duration::ZERO,
                    }
                } else {
                    AttemptDecision::Attempt { pause: delay }
                }
            }
            RetryPolicy::Interval { min_interval } => match self.last_attempt {
                None => AttemptDecision::Attempt {
                    pause: Duration::ZERO,
                },
                Some(last) => {
                    let elapsed = now.saturating_duration_since(last);
                    if elapsed >= min_interval {
                        AttemptDecision::Attempt {
                            pause: Duration::ZERO,
                        }
                    } else {
                        AttemptDecision::Defer {
                            remaining: min_interval - elapsed,
                        }
                    }
                }
            },
        }
    }

    /// Records that an attempt went out at `now` and failed.
    pub fn record_failed_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
        self.failed_attempts = self.failed_attempts.saturating_add(1);
    }

    /// Starts a fresh bounded cycle after `Exhausted` was surfaced.
    pub fn reset_cycle(&mut self) {
        self.failed_attempts = 0;
    }

    pub fn record_connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.failed_attempts = 0;
        self.last_attempt = None;
    }

    pub fn record_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }
}
