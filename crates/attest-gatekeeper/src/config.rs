//! Render gate configuration

use attest_domain::Tolerance;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder substituted for unverified values under [`StrictnessPolicy::Redact`]
pub const REDACTION_PLACEHOLDER: &str = "[unverified value]";

/// Notice shown instead of a blocked response
pub const BLOCK_NOTICE: &str = "[response withheld: it contained numeric values that could not be \
traced to a tool computation in this session]";

/// What happens to a response with an unverified property claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrictnessPolicy {
    /// Withhold the whole response
    #[default]
    Block,
    /// Replace each unverified value with a placeholder
    Redact,
}

impl fmt::Display for StrictnessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrictnessPolicy::Block => f.write_str("block"),
            StrictnessPolicy::Redact => f.write_str("redact"),
        }
    }
}

/// Configuration for the render gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Policy for unverified property claims
    pub strictness: StrictnessPolicy,

    /// Relative tolerance for value matching
    pub relative_tolerance: f64,

    /// Absolute tolerance floor for value matching
    pub absolute_tolerance: f64,

    /// Append `[source: tool, ref E7]` after each verified value
    pub inline_citations: bool,

    /// Replacement text for redacted values
    pub redaction_placeholder: String,

    /// Replacement text for blocked responses
    pub block_notice: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            strictness: StrictnessPolicy::Block,
            relative_tolerance: Tolerance::DEFAULT_RELATIVE,
            absolute_tolerance: Tolerance::DEFAULT_ABSOLUTE,
            inline_citations: false,
            redaction_placeholder: REDACTION_PLACEHOLDER.to_string(),
            block_notice: BLOCK_NOTICE.to_string(),
        }
    }
}

impl GateConfig {
    /// Strict preset: block, 0.1% relative tolerance
    pub fn strict() -> Self {
        Self {
            strictness: StrictnessPolicy::Block,
            relative_tolerance: 0.001,
            ..Self::default()
        }
    }

    /// Lenient preset: redact, 1% relative tolerance
    pub fn lenient() -> Self {
        Self {
            strictness: StrictnessPolicy::Redact,
            relative_tolerance: 0.01,
            ..Self::default()
        }
    }

    /// Matching tolerance
    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.relative_tolerance, self.absolute_tolerance)
    }

    /// Validate the configuration
    ///
    /// Replacement texts may not contain digits, otherwise gating already
    /// sanitized output would find new candidates in them. The redaction
    /// placeholder must be in square brackets, which the scanner treats as
    /// a keyword window boundary.
    pub fn validate(&self) -> Result<(), String> {
        self.tolerance().validate()?;
        for (name, text) in [
            ("redaction_placeholder", &self.redaction_placeholder),
            ("block_notice", &self.block_notice),
        ] {
            if text.trim().is_empty() {
                return Err(format!("{} must not be empty", name));
            }
            if text.chars().any(|c| c.is_ascii_digit()) {
                return Err(format!("{} must not contain digits", name));
            }
        }
        let placeholder = self.redaction_placeholder.trim();
        if !(placeholder.starts_with('[') && placeholder.ends_with(']')) {
            return Err("redaction_placeholder must be enclosed in square brackets".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GateConfig::default();
        assert_eq!(config.strictness, StrictnessPolicy::Block);
        assert_eq!(config.tolerance(), Tolerance::default());
        assert!(!config.inline_citations);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        assert_eq!(GateConfig::strict().relative_tolerance, 0.001);
        assert_eq!(GateConfig::lenient().strictness, StrictnessPolicy::Redact);
        assert!(GateConfig::strict().validate().is_ok());
        assert!(GateConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_replacement_texts_must_not_contain_digits() {
        let config = GateConfig {
            redaction_placeholder: "[value 1]".to_string(),
            ..GateConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(!BLOCK_NOTICE.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_placeholder_must_be_bracketed() {
        let config = GateConfig {
            redaction_placeholder: "unverified value".to_string(),
            ..GateConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GateConfig {
            redaction_placeholder: "[redacted]".to_string(),
            ..GateConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_wire_format() {
        #[derive(Deserialize)]
        struct Wrapper {
            strictness: StrictnessPolicy,
        }
        let parsed: Wrapper = toml::from_str("strictness = \"redact\"").unwrap();
        assert_eq!(parsed.strictness, StrictnessPolicy::Redact);
    }
}
