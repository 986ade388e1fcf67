pub mod calculator;
pub mod refresher;
pub mod store;

pub use calculator::Levels;
pub use store::{PivotStatus, Snapshot, Store};
