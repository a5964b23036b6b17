//! Replay command implementation.

use crate::cli::ReplayArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use attest_journal::{AuditSink, FileSink, MemorySink, SharedSink};
use attest_pipeline::{Dispatcher, HostEvent, PipelineConfig, RenderedMessage, SessionReport};
use std::path::Path;

/// Everything a replay produced
#[derive(Debug)]
pub struct Replay {
    /// Sanitized final messages, in the order they were rendered
    pub messages: Vec<RenderedMessage>,
    /// One report per session, sorted by session id
    pub reports: Vec<SessionReport>,
}

/// Execute the replay command.
pub async fn execute_replay(args: ReplayArgs, mut config: PipelineConfig, formatter: &Formatter) -> Result<()> {
    if let Some(strictness) = args.strictness {
        config.strictness = strictness.into();
    }

    let replay = replay(&args.events, args.audit_log.as_deref(), config).await?;
    for message in &replay.messages {
        println!("{}", formatter.format_rendered(message)?);
    }
    println!("{}", formatter.format_reports(&replay.reports)?);

    if let Some(path) = &args.audit_log {
        eprintln!("{}", formatter.success(&format!("Audit trail appended to {}", path.display())));
    }
    let halted = replay.reports.iter().filter(|r| r.halt_reason.is_some()).count();
    if halted > 0 {
        eprintln!("{}", formatter.warning(&format!("{} session(s) halted", halted)));
    }
    Ok(())
}

/// Run a recorded event file through a dispatcher
///
/// With `audit_log`, every session appends to that one file; otherwise the
/// trail is only kept in memory and returned in the reports.
pub async fn replay(path: &Path, audit_log: Option<&Path>, config: PipelineConfig) -> Result<Replay> {
    let contents = tokio::fs::read_to_string(path).await?;
    let events = parse_events(&contents)?;
    tracing::info!("Replaying {} events from {}", events.len(), path.display());

    let shared = match audit_log {
        Some(path) => Some(SharedSink::new(Box::new(FileSink::open(path)?))),
        None => None,
    };
    let (mut dispatcher, mut rendered) = Dispatcher::new(config, move |_| {
        let sink: Box<dyn AuditSink> = match &shared {
            Some(shared) => Box::new(shared.clone()),
            None => Box::new(MemorySink::new()),
        };
        Ok(sink)
    })?;

    for event in events {
        dispatcher.dispatch(event).await?;
    }
    let reports = dispatcher.shutdown().await?;

    let mut messages = Vec::new();
    while let Some(message) = rendered.recv().await {
        messages.push(message);
    }
    Ok(Replay { messages, reports })
}

/// Parse JSON Lines, skipping blank lines
pub fn parse_events(contents: &str) -> Result<Vec<HostEvent>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            HostEvent::from_json_line(line).map_err(|e| CliError::InvalidEvent {
                line: index + 1,
                message: e.to_string(),
            })
        })
        .collect()
}
