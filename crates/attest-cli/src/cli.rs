//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Attest CLI - Replay host event streams through the provenance gate.
#[derive(Debug, Parser)]
#[command(name = "attest")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "text")]
    pub format: CliFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ATTEST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Human-readable text and tables (default)
    Text,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a recorded host event stream (JSON Lines)
    Replay(ReplayArgs),

    /// Show the numeric claims the render gate would rule on
    Scan(ScanArgs),

    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

/// Arguments for the replay command.
#[derive(Debug, Parser)]
pub struct ReplayArgs {
    /// Event file, one host event per line
    pub events: PathBuf,

    /// Append the audit trail of every session to this file
    #[arg(short, long)]
    pub audit_log: Option<PathBuf>,

    /// Override the configured strictness
    #[arg(short, long, value_enum)]
    pub strictness: Option<StrictnessArg>,
}

/// Arguments for the scan command.
#[derive(Debug, Parser)]
pub struct ScanArgs {
    /// Text to scan
    pub text: String,
}

/// Arguments for the config command.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Print a preset instead of the loaded configuration
    #[arg(short, long, value_enum)]
    pub preset: Option<PresetArg>,
}

/// Strictness argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrictnessArg {
    /// Withhold the whole response
    Block,
    /// Replace unverified values with a placeholder
    Redact,
}

/// Configuration preset argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PresetArg {
    /// Block, 0.5% relative tolerance
    Default,
    /// Block, 0.1% relative tolerance
    Strict,
    /// Redact, 1% relative tolerance
    Lenient,
}

impl From<StrictnessArg> for attest_gatekeeper::StrictnessPolicy {
    fn from(strictness: StrictnessArg) -> Self {
        match strictness {
            StrictnessArg::Block => attest_gatekeeper::StrictnessPolicy::Block,
            StrictnessArg::Redact => attest_gatekeeper::StrictnessPolicy::Redact,
        }
    }
}

impl From<PresetArg> for attest_pipeline::PipelineConfig {
    fn from(preset: PresetArg) -> Self {
        match preset {
            PresetArg::Default => attest_pipeline::PipelineConfig::default(),
            PresetArg::Strict => attest_pipeline::PipelineConfig::strict(),
            PresetArg::Lenient => attest_pipeline::PipelineConfig::lenient(),
        }
    }
}
