//! Output formatting for the CLI.

use crate::cli::CliFormat;
use crate::error::Result;
use attest_domain::{ClaimKind, RenderDecision, RenderOutcome};
use attest_gatekeeper::ClaimCandidate;
use attest_pipeline::{PipelineConfig, RenderedMessage, SessionReport};
use colored::*;
use serde_json::json;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: CliFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: CliFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format one sanitized final message with its decisions.
    pub fn format_rendered(&self, message: &RenderedMessage) -> Result<String> {
        let output = &message.output;
        match self.format {
            CliFormat::Json => Ok(serde_json::to_string(&json!({
                "session_id": message.session_id,
                "sanitized_text": output.sanitized_text,
                "blocked": output.blocked,
                "decisions": output.decisions,
            }))?),
            CliFormat::Text => {
                let header = if output.blocked {
                    self.colorize(&format!("[{}] blocked", message.session_id), "red")
                } else {
                    self.colorize(&format!("[{}]", message.session_id), "cyan")
                };
                let mut lines = vec![header, output.sanitized_text.clone()];
                if !output.decisions.is_empty() {
                    lines.push(self.format_decisions_table(&output.decisions));
                }
                Ok(lines.join("\n"))
            }
        }
    }

    /// Format the claims found in a text.
    pub fn format_candidates(&self, text: &str, candidates: &[ClaimCandidate]) -> Result<String> {
        match self.format {
            CliFormat::Json => {
                let rows: Vec<serde_json::Value> = candidates
                    .iter()
                    .map(|candidate| {
                        json!({
                            "span": candidate.span,
                            "text": &text[candidate.span.start..candidate.span.end],
                            "value": candidate.value,
                            "unit": candidate.unit,
                            "keyword": candidate.keyword.as_ref().map(|k| k.property),
                            "kind": candidate.kind,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&rows)?)
            }
            CliFormat::Text => {
                if candidates.is_empty() {
                    return Ok(self.colorize("No numeric claims found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Span", "Text", "Value", "Unit", "Property", "Kind"]);
                for candidate in candidates {
                    builder.push_record([
                        format!("{}..{}", candidate.span.start, candidate.span.end),
                        text[candidate.span.start..candidate.span.end].to_string(),
                        candidate.value.to_string(),
                        candidate.unit.unwrap_or("-").to_string(),
                        candidate
                            .keyword
                            .as_ref()
                            .map(|k| k.property.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        kind_label(candidate.kind).to_string(),
                    ]);
                }
                Ok(self.finish_table(builder))
            }
        }
    }

    /// Format the end-of-session reports.
    pub fn format_reports(&self, reports: &[SessionReport]) -> Result<String> {
        match self.format {
            CliFormat::Json => {
                let rows: Vec<serde_json::Value> = reports
                    .iter()
                    .map(|report| {
                        json!({
                            "session_id": report.session_id,
                            "status": report.status,
                            "halt_reason": report.halt_reason,
                            "entries": report.entries.len(),
                            "superseded": report.superseded.len(),
                            "tool_calls": report.metrics.tool_calls,
                            "excluded_calls": report.metrics.excluded_calls,
                            "audit_records": report.audit_events.len(),
                        })
                    })
                    .collect();
                Ok(serde_json::to_string(&json!({ "sessions": rows }))?)
            }
            CliFormat::Text => {
                let mut builder = Builder::default();
                builder.push_record(["Session", "Status", "Entries", "Tool calls", "Audit records"]);
                for report in reports {
                    builder.push_record([
                        report.session_id.to_string(),
                        report.status.to_string(),
                        report.entries.len().to_string(),
                        format!("{} ({} excluded)", report.metrics.tool_calls, report.metrics.excluded_calls),
                        report.audit_events.len().to_string(),
                    ]);
                }
                Ok(self.finish_table(builder))
            }
        }
    }

    /// Format the effective configuration.
    pub fn format_config(&self, config: &PipelineConfig) -> Result<String> {
        match self.format {
            CliFormat::Json => Ok(serde_json::to_string_pretty(config)?),
            CliFormat::Text => config.to_toml().map_err(crate::error::CliError::Config),
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn format_decisions_table(&self, decisions: &[RenderDecision]) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Claim", "Unit/keyword", "Kind", "Outcome", "Source"]);
        for decision in decisions {
            let outcome = match decision.outcome {
                RenderOutcome::Allow => self.colorize("ALLOW", "green"),
                RenderOutcome::Redact => self.colorize("REDACT", "yellow"),
                RenderOutcome::Block => self.colorize("BLOCK", "red"),
            };
            builder.push_record([
                decision.span_text.clone(),
                decision.candidate_unit_or_keyword.clone(),
                kind_label(decision.claim_kind).to_string(),
                outcome,
                decision
                    .citation
                    .as_ref()
                    .map(|citation| citation.to_string())
                    .unwrap_or_else(|| decision.matched_ref_label()),
            ]);
        }
        self.finish_table(builder)
    }

    fn finish_table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn kind_label(kind: ClaimKind) -> &'static str {
    match kind {
        ClaimKind::Property => "property",
        ClaimKind::Narrative => "narrative",
    }
}
