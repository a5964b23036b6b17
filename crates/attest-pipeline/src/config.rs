//! Configuration for the pipeline
//!
//! A single flat TOML table shared by every stage.

use crate::error::PipelineError;
use attest_extractor::ExtractorConfig;
use attest_gatekeeper::{GateConfig, StrictnessPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a provenance-enforcing session
///
/// # Examples
///
/// ```
/// use attest_gatekeeper::StrictnessPolicy;
/// use attest_pipeline::PipelineConfig;
///
/// // Default configuration: block, 0.5% relative tolerance
/// let config = PipelineConfig::default();
/// assert_eq!(config.strictness, StrictnessPolicy::Block);
///
/// // Strict: 0.1% relative tolerance
/// let config = PipelineConfig::strict();
/// assert_eq!(config.relative_tolerance, 0.001);
///
/// // Lenient: redact instead of block, 1% relative tolerance
/// let config = PipelineConfig::lenient();
/// assert_eq!(config.strictness, StrictnessPolicy::Redact);
/// ```
///
/// The configuration can be loaded from TOML:
///
/// ```toml
/// strictness = "block"
/// relative_tolerance = 0.005
/// absolute_tolerance = 0.001
/// max_unwrap_depth = 5
/// inline_citations = false
/// channel_capacity = 256
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Policy for unverified property claims
    pub strictness: StrictnessPolicy,

    /// Relative tolerance for matching text values against the registry
    pub relative_tolerance: f64,

    /// Absolute tolerance floor
    pub absolute_tolerance: f64,

    /// Maximum number of transport envelopes peeled from a tool output
    pub max_unwrap_depth: usize,

    /// Append citations after verified values in the sanitized text
    pub inline_citations: bool,

    /// Events buffered per session before the host is back-pressured
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let gate = GateConfig::default();
        Self {
            strictness: gate.strictness,
            relative_tolerance: gate.relative_tolerance,
            absolute_tolerance: gate.absolute_tolerance,
            max_unwrap_depth: ExtractorConfig::default().max_unwrap_depth,
            inline_citations: gate.inline_citations,
            channel_capacity: 256,
        }
    }
}

impl PipelineConfig {
    /// Strict preset: block, 0.1% relative tolerance
    pub fn strict() -> Self {
        Self::from_gate(GateConfig::strict())
    }

    /// Lenient preset: redact, 1% relative tolerance
    pub fn lenient() -> Self {
        Self::from_gate(GateConfig::lenient())
    }

    fn from_gate(gate: GateConfig) -> Self {
        Self {
            strictness: gate.strictness,
            relative_tolerance: gate.relative_tolerance,
            absolute_tolerance: gate.absolute_tolerance,
            ..Self::default()
        }
    }

    /// Settings for the render gate
    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            strictness: self.strictness,
            relative_tolerance: self.relative_tolerance,
            absolute_tolerance: self.absolute_tolerance,
            inline_citations: self.inline_citations,
            ..GateConfig::default()
        }
    }

    /// Settings for the extractor
    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            max_unwrap_depth: self.max_unwrap_depth,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.gate_config().validate()?;
        self.extractor_config().validate()?;
        if self.channel_capacity == 0 {
            return Err("channel_capacity must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&contents).map_err(PipelineError::Config)?;
        config.validate().map_err(PipelineError::Config)?;
        Ok(config)
    }
}
