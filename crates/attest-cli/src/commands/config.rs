//! Config command implementation.

use crate::cli::ConfigArgs;
use crate::error::Result;
use crate::output::Formatter;
use attest_pipeline::PipelineConfig;

/// Execute the config command.
pub fn execute_config(args: ConfigArgs, loaded: &PipelineConfig, formatter: &Formatter) -> Result<()> {
    let config = match args.preset {
        Some(preset) => PipelineConfig::from(preset),
        None => loaded.clone(),
    };
    println!("{}", formatter.format_config(&config)?);
    Ok(())
}
