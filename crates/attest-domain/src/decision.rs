//! Render decisions - the gate's verdict on each numeric claim

use crate::invocation::CallId;
use crate::provenance::EntryRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict for one numeric claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RenderOutcome {
    /// Shown to the user
    Allow,
    /// Replaced by a placeholder
    Redact,
    /// Causes the whole response to be withheld
    Block,
}

impl fmt::Display for RenderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RenderOutcome::Allow => "ALLOW",
            RenderOutcome::Redact => "REDACT",
            RenderOutcome::Block => "BLOCK",
        };
        f.write_str(label)
    }
}

/// Whether a number asserts a property or just narrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    /// "the formation energy is -6.82 eV/atom"
    Property,
    /// "generated 5 candidates"
    Narrative,
}

/// Byte range within the candidate text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextSpan {
    /// Inclusive start offset
    pub start: usize,
    /// Exclusive end offset
    pub end: usize,
}

impl TextSpan {
    /// Create a span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where an allowed value came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Matched registry entry
    pub entry_ref: EntryRef,
    /// Tool that computed the value
    pub source_tool: String,
    /// Invocation that computed the value
    pub call_id: CallId,
    /// When the value was committed
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[source: {}, ref {}]", self.source_tool, self.entry_ref)
    }
}

/// The gate's decision about one numeric claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderDecision {
    /// Location of the claim (number plus unit) in the text
    pub text_span: TextSpan,

    /// The claim as written
    pub span_text: String,

    /// Parsed value
    pub candidate_value: f64,

    /// Unit or property keyword the value was associated with
    pub candidate_unit_or_keyword: String,

    /// Property assertion or narrative number
    pub claim_kind: ClaimKind,

    /// Verdict
    pub outcome: RenderOutcome,

    /// Registry entry backing an allowed property claim
    pub matched_entry_ref: Option<EntryRef>,

    /// Citation for an allowed property claim
    pub citation: Option<Citation>,
}

impl RenderDecision {
    /// Matched entry reference, or `NONE` for the audit trail
    pub fn matched_ref_label(&self) -> String {
        self.matched_entry_ref
            .map(|entry_ref| entry_ref.to_string())
            .unwrap_or_else(|| "NONE".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_wire_format() {
        assert_eq!(serde_json::to_value(RenderOutcome::Redact).unwrap(), "REDACT");
        assert_eq!(RenderOutcome::Block.to_string(), "BLOCK");
    }

    #[test]
    fn test_unmatched_label_is_none() {
        let decision = RenderDecision {
            text_span: TextSpan::new(0, 4),
            span_text: "1.5 eV".to_string(),
            candidate_value: 1.5,
            candidate_unit_or_keyword: "eV".to_string(),
            claim_kind: ClaimKind::Property,
            outcome: RenderOutcome::Block,
            matched_entry_ref: None,
            citation: None,
        };
        assert_eq!(decision.matched_ref_label(), "NONE");
    }

    #[test]
    fn test_citation_display_has_no_digits_outside_ref() {
        let citation = Citation {
            entry_ref: EntryRef::from_seq(7),
            source_tool: "energy_calculator".to_string(),
            call_id: CallId::new("c"),
            timestamp: Utc::now(),
        };
        assert_eq!(citation.to_string(), "[source: energy_calculator, ref E7]");
    }
}
