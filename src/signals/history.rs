// =============================================================================
// Signal History — bounded ring buffer with multi-criterion query
// =============================================================================

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::signals::signal::Signal;
use crate::types::{Direction, Level, Period};

const DEFAULT_LIMIT: usize = 200;
const MAX_LIMIT: usize = 4000;

/// Filter criteria for a history query. An empty/`None` field means "any".
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub symbol: Option<String>,
    pub period: Option<Period>,
    pub levels: Option<Vec<Level>>,
    pub direction: Option<Direction>,
    pub source: Option<String>,
    pub limit: i64,
}

impl HistoryQuery {
    fn clamped_limit(&self) -> usize {
        if self.limit <= 0 {
            DEFAULT_LIMIT
        } else if self.limit as usize > MAX_LIMIT {
            MAX_LIMIT
        } else {
            self.limit as usize
        }
    }

    fn matches(&self, signal: &Signal) -> bool {
        if let Some(ref symbol) = self.symbol {
            if !symbol.is_empty()
                && !signal
                    .symbol
                    .to_ascii_lowercase()
                    .contains(&symbol.to_ascii_lowercase())
            {
                return false;
            }
        }
        if let Some(period) = self.period {
            if signal.period != period {
                return false;
            }
        }
        if let Some(ref levels) = self.levels {
            if !levels.is_empty() && !levels.contains(&signal.level) {
                return false;
            }
        }
        if let Some(direction) = self.direction {
            if signal.direction != direction {
                return false;
            }
        }
        if let Some(ref source) = self.source {
            if !source.is_empty() && &signal.source != source {
                return false;
            }
        }
        true
    }
}

/// Bounded, thread-safe rolling history of recently emitted signals.
pub struct History {
    capacity: usize,
    ring: Mutex<VecDeque<Signal>>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ring: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
        }
    }

    /// Appends a signal, evicting the oldest entry if over capacity.
    pub fn add(&self, signal: Signal) {
        let mut ring = self.ring.lock();
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(signal);
    }

    pub fn count(&self) -> usize {
        self.ring.lock().len()
    }

    /// Returns matching signals, most recent first, respecting `query.limit`.
    pub fn query(&self, query: &HistoryQuery) -> Vec<Signal> {
        let limit = query.clamped_limit();
        let ring = self.ring.lock();
        ring.iter()
            .rev()
            .filter(|s| query.matches(s))
            .take(limit)
            .cloned()
            .collect()
    }
}
