// =============================================================================
// Shared types used across the pivot monitor
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bar horizon a set of pivot levels was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
}

impl Period {
    pub const ALL: [Period; 2] = [Period::Daily, Period::Weekly];

    /// Binance kline interval string for this period.
    pub fn interval(&self) -> &'static str {
        match self {
            Period::Daily => "1d",
            Period::Weekly => "1w",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Daily => write!(f, "daily"),
            Period::Weekly => write!(f, "weekly"),
        }
    }
}

impl std::str::FromStr for Period {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" | "1d" | "d" => Ok(Period::Daily),
            "weekly" | "1w" | "w" => Ok(Period::Weekly),
            _ => Err(()),
        }
    }
}

/// Direction of a level crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// One of the eleven Camarilla pivot levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    PP,
    R1,
    R2,
    R3,
    R4,
    R5,
    S1,
    S2,
    S3,
    S4,
    S5,
}

impl Level {
    /// All eleven levels, checked on every price update per the crossing contract.
    pub const ALL: [Level; 11] = [
        Level::PP,
        Level::R1,
        Level::R2,
        Level::R3,
        Level::R4,
        Level::R5,
        Level::S1,
        Level::S2,
        Level::S3,
        Level::S4,
        Level::S5,
    ];
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::PP => "PP",
            Level::R1 => "R1",
            Level::R2 => "R2",
            Level::R3 => "R3",
            Level::R4 => "R4",
            Level::R5 => "R5",
            Level::S1 => "S1",
            Level::S2 => "S2",
            Level::S3 => "S3",
            Level::S4 => "S4",
            Level::S5 => "S5",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Level {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PP" => Ok(Level::PP),
            "R1" => Ok(Level::R1),
            "R2" => Ok(Level::R2),
            "R3" => Ok(Level::R3),
            "R4" => Ok(Level::R4),
            "R5" => Ok(Level::R5),
            "S1" => Ok(Level::S1),
            "S2" => Ok(Level::S2),
            "S3" => Ok(Level::S3),
            "S4" => Ok(Level::S4),
            "S5" => Ok(Level::S5),
            _ => Err(()),
        }
    }
}

/// Domain error taxonomy shared across components.
///
/// Transient plumbing errors (I/O, one-off upstream hiccups) are usually
/// handled with `anyhow::Result` + `.context(..)` at the call site; this enum
/// covers the cases callers need to branch on.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to decode feed frame: {0}")]
    DecodeFailure(String),

    #[error("upstream error (status {status}): {body}")]
    UpstreamError { status: u16, body: String },

    #[error("invalid OHLC range: high={high} low={low} close={close}")]
    InvalidRange { high: f64, low: f64, close: f64 },

    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("client is gone")]
    ClientGone,
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
