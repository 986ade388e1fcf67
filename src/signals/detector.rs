// =============================================================================
// Crossing Detector — edge-triggered level crossing over both periods
// =============================================================================
//
// Owns the last-price map exclusively: this component is meant to be driven
// serially from one Feed Client, so there is no need to synchronise it
// internally beyond what a single-writer HashMap requires.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::broker::Broker;
use crate::pivot::calculator::Levels;
use crate::pivot::store::Store;
use crate::signals::cooldown::CooldownGate;
use crate::signals::history::History;
use crate::signals::signal::Signal;
use crate::types::{Direction, Level, Period};

/// Source tag recorded on every emitted signal.
const SOURCE: &str = "binance";

pub struct Detector {
    store: Arc<Store>,
    cooldown: Arc<CooldownGate>,
    history: Arc<History>,
    broker: Broker<Signal>,
    last_price: HashMap<String, f64>,
    seq: AtomicU64,
}

impl Detector {
    pub fn new(
        store: Arc<Store>,
        cooldown: Arc<CooldownGate>,
        history: Arc<History>,
        broker: Broker<Signal>,
    ) -> Self {
        Self {
            store,
            cooldown,
            history,
            broker,
            last_price: HashMap::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Processes one observed price for `symbol`. The first observation for
    /// any symbol only establishes a baseline and never emits a signal.
    pub fn on_price(&mut self, symbol: &str, price: f64, ts: DateTime<Utc>) {
        let prev = self.last_price.insert(symbol.to_string(), price);

        let Some(prev) = prev else {
            return;
        };

        for period in Period::ALL {
            let Some(levels) = self.store.get_levels(period, symbol) else {
                continue;
            };
            self.check_period(symbol, period, &levels, prev, price, ts);
        }
    }

    fn check_period(
        &self,
        symbol: &str,
        period: Period,
        levels: &Levels,
        prev: f64,
        price: f64,
        ts: DateTime<Utc>,
    ) {
        for level in Level::ALL {
            let target = levels.value(level);
            if target <= 0.0 {
                continue;
            }

            let direction = if prev < target && price >= target {
                Some(Direction::Up)
            } else if prev > target && price <= target {
                Some(Direction::Down)
            } else {
                None
            };

            if let Some(direction) = direction {
                self.emit(symbol, period, level, price, direction, ts);
            }
        }
    }

    fn emit(
        &self,
        symbol: &str,
        period: Period,
        level: Level,
        price: f64,
        direction: Direction,
        ts: DateTime<Utc>,
    ) {
        let key = format!("{symbol}|{period}|{level}");
        if !self.cooldown.allow(&key, ts) {
            return;
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let signal = Signal {
            id: Signal::make_id(ts, seq),
            symbol: symbol.to_string(),
            period,
            level,
            price,
            direction,
            triggered_at: ts,
            source: SOURCE.to_string(),
        };

        debug!(symbol, ?period, ?level, ?direction, price, "pivot level crossed");
        self.history.add(signal.clone());
        self.broker.publish(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Period;
    use std::collections::HashMap as StdHashMap;

    fn fixture() -> (Detector, Arc<Store>, Arc<History>) {
        let store = Arc::new(Store::new(chrono::Duration::hours(2)));
        let cooldown = Arc::new(CooldownGate::new(std::time::Duration::from_secs(60)));
        let history = Arc::new(History::new(100));
        let broker: Broker<Signal> = Broker::new();

        let levels = Levels::calculate(110.0, 90.0, 100.0).unwrap();
        let mut symbols = StdHashMap::new();
        symbols.insert("BTCUSDT".to_string(), levels);
        store
            .swap(crate::pivot::store::Snapshot::new(Period::Daily, symbols))
            .unwrap();

        let detector = Detector::new(store.clone(), cooldown, history.clone(), broker);
        (detector, store, history)
    }

    #[test]
    fn baseline_observation_emits_nothing() {
        let (mut detector, _store, history) = fixture();
        detector.on_price("BTCUSDT", 100.0, Utc::now());
        assert_eq!(history.count(), 0);
    }

    #[test]
    fn up_edge_crossing_emits_once() {
        let (mut detector, _store, history) = fixture();
        let levels = Levels::calculate(110.0, 90.0, 100.0).unwrap();
        let r3 = levels.r3;

        detector.on_price("BTCUSDT", r3 - 1.0, Utc::now());
        detector.on_price("BTCUSDT", r3 + 1.0, Utc::now());

        assert_eq!(history.count(), 1);
        let signals = history.query(&Default::default());
        assert_eq!(signals[0].direction, Direction::Up);
        assert_eq!(signals[0].level, Level::R3);
    }

    #[test]
    fn down_edge_crossing_emits_once() {
        let (mut detector, _store, history) = fixture();
        let levels = Levels::calculate(110.0, 90.0, 100.0).unwrap();
        let s3 = levels.s3;

        detector.on_price("BTCUSDT", s3 + 1.0, Utc::now());
        detector.on_price("BTCUSDT", s3 - 1.0, Utc::now());

        assert_eq!(history.count(), 1);
        let signals = history.query(&Default::default());
        assert_eq!(signals[0].direction, Direction::Down);
        assert_eq!(signals[0].level, Level::S3);
    }

    #[test]
    fn touch_without_crossing_does_not_emit() {
        let (mut detector, _store, history) = fixture();
        let levels = Levels::calculate(110.0, 90.0, 100.0).unwrap();
        let r3 = levels.r3;

        detector.on_price("BTCUSDT", r3, Utc::now());
        detector.on_price("BTCUSDT", r3, Utc::now());

        assert_eq!(history.count(), 0);
    }

    #[test]
    fn gap_crosses_multiple_levels_at_once() {
        let (mut detector, _store, history) = fixture();
        let levels = Levels::calculate(110.0, 90.0, 100.0).unwrap();

        detector.on_price("BTCUSDT", levels.s4 - 1.0, Utc::now());
        detector.on_price("BTCUSDT", levels.r4 + 1.0, Utc::now());

        // Every level strictly between the two prices (inclusive of r4) crosses up.
        assert!(history.count() >= 5);
        let signals = history.query(&Default::default());
        assert!(signals.iter().all(|s| s.direction == Direction::Up));
    }

    #[test]
    fn cooldown_blocks_repeat_crossings_of_the_same_key() {
        let (mut detector, _store, history) = fixture();
        let levels = Levels::calculate(110.0, 90.0, 100.0).unwrap();
        let r3 = levels.r3;
        let t0 = Utc::now();

        detector.on_price("BTCUSDT", r3 - 1.0, t0);
        detector.on_price("BTCUSDT", r3 + 1.0, t0);
        detector.on_price("BTCUSDT", r3 - 1.0, t0 + chrono::Duration::seconds(1));
        detector.on_price("BTCUSDT", r3 + 1.0, t0 + chrono::Duration::seconds(2));

        assert_eq!(history.count(), 1);
    }

    #[test]
    fn missing_snapshot_for_symbol_emits_nothing() {
        let (mut detector, _store, history) = fixture();
        detector.on_price("UNKNOWNUSDT", 1.0, Utc::now());
        detector.on_price("UNKNOWNUSDT", 2.0, Utc::now());
        assert_eq!(history.count(), 0);
    }
}
