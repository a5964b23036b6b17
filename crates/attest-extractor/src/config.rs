//! Configuration for the Extractor

use crate::unwrap::DEFAULT_MAX_UNWRAP_DEPTH;
use serde::{Deserialize, Serialize};

/// Upper bound accepted for `max_unwrap_depth`
const MAX_UNWRAP_DEPTH_LIMIT: usize = 32;

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum number of transport envelopes peeled from one output
    pub max_unwrap_depth: usize,
}

impl ExtractorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_unwrap_depth == 0 {
            return Err("max_unwrap_depth must be greater than 0".to_string());
        }
        if self.max_unwrap_depth > MAX_UNWRAP_DEPTH_LIMIT {
            return Err(format!(
                "max_unwrap_depth cannot exceed {}",
                MAX_UNWRAP_DEPTH_LIMIT
            ));
        }
        Ok(())
    }

}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_unwrap_depth: DEFAULT_MAX_UNWRAP_DEPTH,
        }
    }
}
