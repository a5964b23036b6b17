//! Physical units attached to provenance values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker stored for values whose payload carried no unit
pub const UNIT_UNKNOWN: &str = "UNIT_UNKNOWN";

/// Unit of a numeric value as reported by the tool
///
/// Units are kept verbatim (trimmed) as the tool spelled them. Spelling
/// variants such as `eV/atom` and `eV per atom` are reconciled by the render
/// gate's lexicon, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Unit {
    /// A unit explicitly present in the payload or the tool's contract
    Known(String),

    /// No unit could be sourced; never matched against text claims
    Unknown,
}

impl Unit {
    /// Build a unit from a raw spelling; blank or marker strings are `Unknown`
    ///
    /// # Examples
    ///
    /// ```
    /// use attest_domain::Unit;
    ///
    /// assert!(Unit::parse(" eV/atom ").is_known());
    /// assert!(!Unit::parse("").is_known());
    /// ```
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == UNIT_UNKNOWN {
            Unit::Unknown
        } else {
            Unit::Known(trimmed.to_string())
        }
    }

    /// Whether the unit is known
    pub fn is_known(&self) -> bool {
        matches!(self, Unit::Known(_))
    }

    /// The unit spelling, or [`UNIT_UNKNOWN`]
    pub fn as_str(&self) -> &str {
        match self {
            Unit::Known(unit) => unit,
            Unit::Unknown => UNIT_UNKNOWN,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Unit {
    fn from(value: String) -> Self {
        Unit::parse(&value)
    }
}

impl From<Unit> for String {
    fn from(value: Unit) -> Self {
        value.as_str().to_string()
    }
}
