// =============================================================================
// Signals Module
// =============================================================================
//
// Everything involved in turning a raw price update into a durable, rate
// limited crossing signal: the record type, the edge-trigger detector, the
// per-key cooldown gate, and the bounded queryable history.

pub mod cooldown;
pub mod detector;
pub mod history;
pub mod signal;

pub use cooldown::CooldownGate;
pub use detector::Detector;
pub use history::{History, HistoryQuery};
pub use signal::Signal;
