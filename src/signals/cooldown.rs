// =============================================================================
// Cooldown Gate — per (symbol, period, level) emission throttling
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30 * 60);

pub struct CooldownGate {
    dur: chrono::Duration,
    last: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl CooldownGate {
    /// A non-positive `dur` is coerced to the default of 30 minutes.
    pub fn new(dur: Duration) -> Self {
        let dur = if dur.is_zero() { DEFAULT_COOLDOWN } else { dur };
        Self {
            dur: chrono::Duration::from_std(dur).unwrap_or_else(|_| {
                chrono::Duration::from_std(DEFAULT_COOLDOWN).expect("default cooldown is valid")
            }),
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true and records `now` if `key` is outside its cooldown
    /// window; otherwise returns false without mutating state.
    pub fn allow(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut last = self.last.lock();
        match last.get(key) {
            Some(prev) if now - *prev < self.dur => false,
            _ => {
                last.insert(key.to_string(), now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_always_allowed() {
        let gate = CooldownGate::new(Duration::from_secs(60));
        assert!(gate.allow("BTCUSDT|daily|R3", Utc::now()));
    }

    #[test]
    fn repeated_call_within_window_denied() {
        let gate = CooldownGate::new(Duration::from_secs(60));
        let t0 = Utc::now();
        assert!(gate.allow("BTCUSDT|daily|R3", t0));
        assert!(!gate.allow("BTCUSDT|daily|R3", t0 + chrono::Duration::seconds(10)));
    }

    #[test]
    fn allowed_again_after_window_elapses() {
        let gate = CooldownGate::new(Duration::from_secs(60));
        let t0 = Utc::now();
        assert!(gate.allow("BTCUSDT|daily|R3", t0));
        assert!(gate.allow("BTCUSDT|daily|R3", t0 + chrono::Duration::seconds(61)));
    }

    #[test]
    fn keys_are_independent() {
        let gate = CooldownGate::new(Duration::from_secs(60));
        let t0 = Utc::now();
        assert!(gate.allow("BTCUSDT|daily|R3", t0));
        assert!(gate.allow("ETHUSDT|daily|R3", t0));
        assert!(gate.allow("BTCUSDT|weekly|R3", t0));
        assert!(gate.allow("BTCUSDT|daily|S3", t0));
    }

    #[test]
    fn zero_duration_coerced_to_default() {
        let gate = CooldownGate::new(Duration::from_secs(0));
        let t0 = Utc::now();
        assert!(gate.allow("BTCUSDT|daily|R3", t0));
        assert!(!gate.allow("BTCUSDT|daily|R3", t0 + chrono::Duration::minutes(5)));
    }
}
