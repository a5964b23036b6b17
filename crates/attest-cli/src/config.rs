//! Configuration lookup for the CLI.

use crate::error::{CliError, Result};
use attest_pipeline::PipelineConfig;
use std::path::{Path, PathBuf};

/// Default configuration file: `<config dir>/attest/config.toml`.
pub fn default_path() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| CliError::Config("Could not find the user configuration directory".into()))?;
    Ok(dir.join("attest").join("config.toml"))
}

/// Load the pipeline configuration.
///
/// An explicit path must exist. Without one, the default path is used when
/// present, and the built-in defaults otherwise.
pub fn load(explicit: Option<&Path>) -> Result<PipelineConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_path() {
            Ok(path) if path.exists() => path,
            _ => {
                tracing::debug!("No configuration file, using defaults");
                return Ok(PipelineConfig::default());
            }
        },
    };

    tracing::debug!("Loading configuration from {}", path.display());
    Ok(PipelineConfig::from_file(&path)?)
}
