//! Per-symbol signal cooldown
//!
//! Owned by whoever emits signals (the watch loop) and passed by reference.
//! A symbol is quiet for `window` after a signal is recorded for it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SignalCooldown {
    window: Duration,
    last_sent: HashMap<String, DateTime<Utc>>,
}

impl SignalCooldown {
    pub fn new(minutes: i64) -> Self {
        Self {
            window: Duration::minutes(minutes.max(0)),
            last_sent: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// True when no signal for `symbol` was recorded within the window
    pub fn should_emit(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        match self.last_sent.get(symbol) {
            Some(last) => {
                let elapsed = now.signed_duration_since(*last);
                if elapsed < self.window {
                    debug!(symbol, elapsed_secs = elapsed.num_seconds(), "Signal in cooldown");
                    false
                } else {
                    true
                }
            }
            None => true,
        }
    }

    pub fn record(&mut self, symbol: &str, now: DateTime<Utc>) {
        self.last_sent.insert(symbol.to_string(), now);
    }

    /// Record and report in one step; false leaves the entry untouched
    pub fn try_emit(&mut self, symbol: &str, now: DateTime<Utc>) -> bool {
        if self.should_emit(symbol, now) {
            self.record(symbol, now);
            true
        } else {
            false
        }
    }

    /// Forget entries whose window has passed
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        self.last_sent
            .retain(|_, last| now.signed_duration_since(*last) < window);
    }

    pub fn len(&self) -> usize {
        self.last_sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_sent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn test_suppresses_within_window() {
        let mut cooldown = SignalCooldown::new(30);
        assert!(cooldown.try_emit("BTCUSDT", at(0)));
        assert!(!cooldown.should_emit("BTCUSDT", at(29)));
        assert!(cooldown.should_emit("BTCUSDT", at(30)));
        // other symbols are independent
        assert!(cooldown.should_emit("ETHUSDT", at(1)));
    }

    #[test]
    fn test_rejected_emit_keeps_original_time() {
        let mut cooldown = SignalCooldown::new(30);
        cooldown.record("BTCUSDT", at(0));
        assert!(!cooldown.try_emit("BTCUSDT", at(20)));
        assert!(cooldown.try_emit("BTCUSDT", at(31)));
    }

    #[test]
    fn test_prune_drops_expired() {
        let mut cooldown = SignalCooldown::new(10);
        cooldown.record("BTCUSDT", at(0));
        cooldown.record("ETHUSDT", at(15));
        cooldown.prune(at(20));
        assert_eq!(cooldown.len(), 1);
        assert!(cooldown.should_emit("BTCUSDT", at(20)));
    }
}
