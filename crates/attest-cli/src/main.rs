//! Attest CLI - replay host event streams through the provenance gate.

use anyhow::Context;
use attest_cli::{commands, config, Cli, Command, Formatter};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr; stdout carries command output
    let filter = EnvFilter::try_from_env("ATTEST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();
    let formatter = Formatter::new(cli.format, !cli.no_color);
    let pipeline_config = config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Replay(args) => {
            let events = args.events.display().to_string();
            commands::execute_replay(args, pipeline_config, &formatter)
                .await
                .with_context(|| format!("Replay of {} failed", events))?;
        }
        Command::Scan(args) => commands::execute_scan(args, &formatter)?,
        Command::Config(args) => commands::execute_config(args, &pipeline_config, &formatter)?,
    }

    Ok(())
}
