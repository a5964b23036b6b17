//! Numeric tolerance for matching rendered text against computed values

use serde::{Deserialize, Serialize};

/// Relative tolerance plus an absolute floor
///
/// A rendered value `claimed` matches a computed value `actual` when
/// `|claimed - actual| <= max(relative * |actual|, absolute)`. The absolute
/// floor keeps values near zero matchable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Fraction of the computed value (0.005 = 0.5%)
    pub relative: f64,

    /// Smallest accepted absolute difference
    pub absolute: f64,
}

impl Tolerance {
    /// Default relative tolerance (0.5%)
    pub const DEFAULT_RELATIVE: f64 = 0.005;

    /// Default absolute floor
    pub const DEFAULT_ABSOLUTE: f64 = 1e-3;

    /// Create a tolerance
    pub fn new(relative: f64, absolute: f64) -> Self {
        Self { relative, absolute }
    }

    /// Exact comparison (zero tolerance)
    pub fn exact() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Width of the accepted band around `actual`
    pub fn band(&self, actual: f64) -> f64 {
        (self.relative * actual.abs()).max(self.absolute)
    }

    /// Whether `claimed` lies within the band around `actual`
    ///
    /// # Examples
    ///
    /// ```
    /// use attest_domain::Tolerance;
    ///
    /// let tol = Tolerance::default();
    /// assert!(tol.matches(-6.82, -6.823));
    /// assert!(!tol.matches(-7.50, -6.823));
    /// ```
    pub fn matches(&self, claimed: f64, actual: f64) -> bool {
        if !claimed.is_finite() || !actual.is_finite() {
            return false;
        }
        (claimed - actual).abs() <= self.band(actual)
    }

    /// Check that both components are finite and non-negative
    pub fn validate(&self) -> Result<(), String> {
        if !self.relative.is_finite() || self.relative < 0.0 {
            return Err(format!("relative tolerance {} must be finite and >= 0", self.relative));
        }
        if !self.absolute.is_finite() || self.absolute < 0.0 {
            return Err(format!("absolute tolerance {} must be finite and >= 0", self.absolute));
        }
        Ok(())
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RELATIVE, Self::DEFAULT_ABSOLUTE)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: a value always matches itself
        #[test]
        fn test_reflexive(value in -1.0e6f64..1.0e6) {
            prop_assert!(Tolerance::default().matches(value, value));
        }

        /// Property: anything inside the band matches, anything clearly outside does not
        #[test]
        fn test_band_boundary(actual in -1.0e3f64..1.0e3, frac in 0.0f64..0.99) {
            let tol = Tolerance::default();
            let band = tol.band(actual);
            prop_assert!(tol.matches(actual + band * frac, actual));
            prop_assert!(!tol.matches(actual + band * 1.5 + 1e-9, actual));
        }
    }
}
