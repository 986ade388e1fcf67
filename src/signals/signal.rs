// =============================================================================
// Signal — a durable record of one pivot level crossing
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Direction, Level, Period};

/// One emitted crossing event, handed to both History and the Broker.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    pub id: String,
    pub symbol: String,
    pub period: Period,
    pub level: Level,
    pub price: f64,
    pub direction: Direction,
    pub triggered_at: DateTime<Utc>,
    pub source: String,
}

impl Signal {
    /// Builds an id unique within this process run: `<nanos>-<seq>`.
    pub fn make_id(triggered_at: DateTime<Utc>, seq: u64) -> String {
        format!("{}-{}", triggered_at.timestamp_nanos_opt().unwrap_or(0), seq)
    }
}
