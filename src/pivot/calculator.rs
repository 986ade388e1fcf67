// =============================================================================
// Pivot Calculator — pure Camarilla pivot math from a prior completed bar
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::EngineError;

/// The eleven Camarilla levels computed from one bar's (high, low, close).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub pp: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub r4: f64,
    pub r5: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
    pub s4: f64,
    pub s5: f64,
}

impl Levels {
    /// Computes the Camarilla levels for the given prior bar. Returns
    /// `InvalidRange` when the inputs can't produce a meaningful pivot set.
    pub fn calculate(high: f64, low: f64, close: f64) -> Result<Self, EngineError> {
        if high <= 0.0 || low <= 0.0 || high < low {
            return Err(EngineError::InvalidRange { high, low, close });
        }

        let range = high - low;
        const K: f64 = 1.1;

        let pp = (high + low + close) / 3.0;
        let r1 = close + range * K / 12.0;
        let r2 = close + range * K / 6.0;
        let r3 = close + range * K / 4.0;
        let r4 = close + range * K / 2.0;
        let r5 = (high / low) * close;

        let s1 = close - range * K / 12.0;
        let s2 = close - range * K / 6.0;
        let s3 = close - range * K / 4.0;
        let s4 = close - range * K / 2.0;
        let s5 = 2.0 * close - r5;

        Ok(Self {
            high,
            low,
            close,
            pp,
            r1,
            r2,
            r3,
            r4,
            r5,
            s1,
            s2,
            s3,
            s4,
            s5,
        })
    }

    /// Looks up the value for a single level.
    pub fn value(&self, level: crate::types::Level) -> f64 {
        use crate::types::Level;
        match level {
            Level::PP => self.pp,
            Level::R1 => self.r1,
            Level::R2 => self.r2,
            Level::R3 => self.r3,
            Level::R4 => self.r4,
            Level::R5 => self.r5,
            Level::S1 => self.s1,
            Level::S2 => self.s2,
            Level::S3 => self.s3,
            Level::S4 => self.s4,
            Level::S5 => self.s5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_or_inverted_range() {
        assert!(Levels::calculate(0.0, 1.0, 1.0).is_err());
        assert!(Levels::calculate(1.0, 0.0, 1.0).is_err());
        assert!(Levels::calculate(1.0, 2.0, 1.0).is_err());
    }

    #[test]
    fn pp_is_mean_of_hlc() {
        let levels = Levels::calculate(110.0, 90.0, 100.0).unwrap();
        assert!((levels.pp - 100.0).abs() < 1e-9);
    }

    #[test]
    fn r5_and_s5_are_symmetric_about_close() {
        let levels = Levels::calculate(110.0, 90.0, 100.0).unwrap();
        assert!(((levels.r5 - levels.close) - (levels.close - levels.s5)).abs() < 1e-9);
    }

    #[test]
    fn resistance_and_support_levels_are_ordered() {
        let levels = Levels::calculate(110.0, 90.0, 100.0).unwrap();
        assert!(levels.r1 < levels.r2 && levels.r2 < levels.r3 && levels.r3 < levels.r4);
        assert!(levels.s1 > levels.s2 && levels.s2 > levels.s3 && levels.s3 > levels.s4);
    }

    proptest::proptest! {
        #[test]
        fn formula_invariants_hold(high in 1.0f64..1_000_000.0, spread in 0.01f64..100_000.0, close in 1.0f64..1_000_000.0) {
            let low = (high - spread).max(0.01);
            if high < low {
                return Ok(());
            }
            let levels = Levels::calculate(high, low, close).unwrap();
            proptest::prop_assert!((levels.pp - (high + low + close) / 3.0).abs() < 1e-6);
            proptest::prop_assert!(((levels.r5 - levels.close) - (levels.close - levels.s5)).abs() < 1e-6);
            if high > low {
                proptest::prop_assert!(levels.r1 < levels.r2);
                proptest::prop_assert!(levels.r2 < levels.r3);
                proptest::prop_assert!(levels.r3 < levels.r4);
                proptest::prop_assert!(levels.s1 > levels.s2);
                proptest::prop_assert!(levels.s2 > levels.s3);
                proptest::prop_assert!(levels.s3 > levels.s4);
            }
        }
    }
}
