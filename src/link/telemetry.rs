//! Periodic counter telemetry.
//!
//! One message per period, counter strictly increasing, a missed or failed
//! publish is simply dropped until the next tick.

use std::time::Duration;
use tokio::time::Instant;

/// Pacing state for the periodic counter publish.
pub struct TelemetryClock {
    period: Duration,
    counter: u64,
    last_publish: Option<Instant>,
}

impl TelemetryClock {
    pub fn new(period: Duration) -> Self {
        TelemetryClock {
            period,
            counter: 0,
            last_publish: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns the next counter value when a period has elapsed since the
    /// last publish, stamping `now` as the publish instant. The first call
    /// is due immediately.
    pub fn due(&mut self, now: Instant) -> Option<u64> {
        let ready = match self.last_publish {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        };
        if !ready {
            return None;
        }
        self.last_publish = Some(now);
        self.counter += 1;
        Some(self.counter)
    }

    /// Formats the message published for counter value `n`.
    pub fn format_message(announcement: &str, n: u64) -> String {
        format!("{} #{}", announcement, n)
    }
}
