// =============================================================================
// Pivot Store — atomic per-period snapshot of symbol -> levels
// =============================================================================
//
// Each period (Daily, Weekly) lives behind its own `RwLock<Option<Arc<Snapshot>>>`.
// Readers only ever hold the lock long enough to clone the `Arc`; the snapshot
// itself is immutable once built, so a reader can never observe a torn update
// even while a Refresher installs a new one concurrently.
//
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::pivot::calculator::Levels;
use crate::types::Period;

/// Immutable mapping of symbol -> levels for one period, built at `built_at`.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub period: Period,
    pub built_at: DateTime<Utc>,
    pub symbols: HashMap<String, Levels>,
}

impl Snapshot {
    pub fn new(period: Period, symbols: HashMap<String, Levels>) -> Self {
        Self {
            period,
            built_at: Utc::now(),
            symbols,
        }
    }
}

/// Freshness view of one period's slot, exposed on the pivot-status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PivotStatus {
    pub symbol_count: usize,
    pub is_stale: bool,
    /// Countdown to the staleness threshold; negative once a snapshot has
    /// already gone stale.
    pub seconds_until: i64,
}

/// Holds the current Daily and Weekly snapshots.
pub struct Store {
    daily: RwLock<Option<Arc<Snapshot>>>,
    weekly: RwLock<Option<Arc<Snapshot>>>,
    /// A snapshot older than this is reported as stale on the status endpoint.
    stale_after: chrono::Duration,
}

impl Store {
    pub fn new(stale_after: chrono::Duration) -> Self {
        Self {
            daily: RwLock::new(None),
            weekly: RwLock::new(None),
            stale_after,
        }
    }

    fn slot(&self, period: Period) -> &RwLock<Option<Arc<Snapshot>>> {
        match period {
            Period::Daily => &self.daily,
            Period::Weekly => &self.weekly,
        }
    }

    /// Returns a cheap clone of the currently installed snapshot, if any.
    pub fn snapshot(&self, period: Period) -> Option<Arc<Snapshot>> {
        self.slot(period).read().clone()
    }

    /// Atomically replaces the slot for `snapshot.period`. A snapshot with an
    /// empty symbol map is rejected so that a failed refresh never wipes out
    /// a previously good, non-empty snapshot.
    pub fn swap(&self, snapshot: Snapshot) -> Result<(), &'static str> {
        if snapshot.symbols.is_empty() {
            return Err("refusing to install an empty snapshot");
        }
        let period = snapshot.period;
        *self.slot(period).write() = Some(Arc::new(snapshot));
        Ok(())
    }

    pub fn get_levels(&self, period: Period, symbol: &str) -> Option<Levels> {
        self.snapshot(period)?.symbols.get(symbol).copied()
    }

    pub fn status(&self, period: Period) -> PivotStatus {
        match self.snapshot(period) {
            Some(snap) => {
                let age = Utc::now() - snap.built_at;
                PivotStatus {
                    symbol_count: snap.symbols.len(),
                    is_stale: age > self.stale_after,
                    seconds_until: (self.stale_after - age).num_seconds(),
                }
            }
            None => PivotStatus {
                symbol_count: 0,
                is_stale: true,
                seconds_until: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_levels() -> Levels {
        Levels::calculate(110.0, 90.0, 100.0).unwrap()
    }

    #[test]
    fn empty_snapshot_is_rejected() {
        let store = Store::new(chrono::Duration::hours(2));
        let snap = Snapshot::new(Period::Daily, HashMap::new());
        assert!(store.swap(snap).is_err());
        assert!(store.snapshot(Period::Daily).is_none());
    }

    #[test]
    fn swap_then_read_round_trips() {
        let store = Store::new(chrono::Duration::hours(2));
        let mut symbols = HashMap::new();
        symbols.insert("BTCUSDT".to_string(), sample_levels());
        store.swap(Snapshot::new(Period::Daily, symbols)).unwrap();

        let levels = store.get_levels(Period::Daily, "BTCUSDT").unwrap();
        assert!((levels.close - 100.0).abs() < 1e-9);
        assert!(store.get_levels(Period::Weekly, "BTCUSDT").is_none());
    }

    #[test]
    fn status_reports_missing_snapshot_as_stale() {
        let store = Store::new(chrono::Duration::hours(2));
        let status = store.status(Period::Weekly);
        assert_eq!(status.symbol_count, 0);
        assert!(status.is_stale);
        assert_eq!(status.seconds_until, 0);
    }

    #[test]
    fn fresh_snapshot_counts_down_to_the_stale_threshold() {
        let store = Store::new(chrono::Duration::hours(2));
        let mut symbols = HashMap::new();
        symbols.insert("BTCUSDT".to_string(), sample_levels());
        store.swap(Snapshot::new(Period::Daily, symbols)).unwrap();

        let status = store.status(Period::Daily);
        assert!(!status.is_stale);
        assert!(status.seconds_until > 0);
        assert!(status.seconds_until <= chrono::Duration::hours(2).num_seconds());
    }

    #[test]
    fn stale_snapshot_reports_negative_seconds_until() {
        let store = Store::new(chrono::Duration::seconds(-1));
        let mut symbols = HashMap::new();
        symbols.insert("BTCUSDT".to_string(), sample_levels());
        store.swap(Snapshot::new(Period::Daily, symbols)).unwrap();

        let status = store.status(Period::Daily);
        assert!(status.is_stale);
        assert!(status.seconds_until < 0);
    }

    #[test]
    fn failed_refresh_keeps_previous_snapshot() {
        let store = Store::new(chrono::Duration::hours(2));
        let mut symbols = HashMap::new();
        symbols.insert("ETHUSDT".to_string(), sample_levels());
        store.swap(Snapshot::new(Period::Daily, symbols)).unwrap();

        let empty = Snapshot::new(Period::Daily, HashMap::new());
        assert!(store.swap(empty).is_err());
        assert!(store.get_levels(Period::Daily, "ETHUSDT").is_some());
    }
}
