//! Liveness ping bookkeeping.
//!
//! The client sends an application-level ping (`{mt: 1, t: now}`) every
//! 30 seconds; the server answers with `mt: 2`, which is consumed silently.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;

/// Interval between liveness pings.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Ping/pong bookkeeping for one connection.
pub struct PingTracker {
    last_ping: RwLock<Option<DateTime<Utc>>>,
    last_pong: RwLock<Option<DateTime<Utc>>>,
}

impl PingTracker {
    pub fn new() -> Self {
        Self {
            last_ping: RwLock::new(None),
            last_pong: RwLock::new(None),
        }
    }

    /// Reset on (re)connect.
    pub fn reset(&self) {
        *self.last_ping.write() = None;
        *self.last_pong.write() = None;
    }

    pub fn record_ping(&self) {
        *self.last_ping.write() = Some(Utc::now());
    }

    pub fn record_pong(&self) {
        *self.last_pong.write() = Some(Utc::now());
    }

    /// Milliseconds since the last pong, if one was ever received.
    pub fn pong_age_ms(&self) -> Option<i64> {
        self.last_pong
            .read()
            .map(|t| (Utc::now() - t).num_milliseconds())
    }
}

impl Default for PingTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let tracker = PingTracker::new();
        assert_eq!(tracker.pong_age_ms(), None);
    }

    #[test]
    fn test_pong_recorded() {
        let tracker = PingTracker::new();
        tracker.record_ping();
        tracker.record_pong();
        assert!(tracker.pong_age_ms().unwrap() >= 0);
        tracker.reset();
        assert_eq!(tracker.pong_age_ms(), None);
    }
}
