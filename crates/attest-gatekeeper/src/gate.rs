//! The render gate: the last check between generated text and the user

use crate::config::{GateConfig, StrictnessPolicy};
use crate::error::GatekeeperError;
use crate::lexicon;
use crate::scanner::{scan, tokenize, ClaimCandidate, TokenKind};
use attest_domain::traits::ProvenanceStore;
use attest_domain::{Citation, ClaimKind, ProvenanceEntry, RenderDecision, RenderOutcome, TextSpan};
use serde::Serialize;
use tracing::{debug, warn};

/// What the user gets to see, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateOutput {
    /// Text safe to show
    pub sanitized_text: String,
    /// One decision per numeric claim, in text order
    pub decisions: Vec<RenderDecision>,
    /// Whether the whole response was withheld
    pub blocked: bool,
}

impl GateOutput {
    /// Number of decisions with `outcome`
    pub fn count(&self, outcome: RenderOutcome) -> usize {
        self.decisions.iter().filter(|d| d.outcome == outcome).count()
    }
}

/// Checks every numeric claim in a draft response against the registry
///
/// # Examples
///
/// ```
/// use attest_domain::{CallId, ProvenanceDraft, RenderOutcome, SessionId, Unit};
/// use attest_domain::traits::ProvenanceStore;
/// use attest_gatekeeper::RenderGate;
/// use attest_registry::ValueRegistry;
///
/// let mut registry = ValueRegistry::new(SessionId::new("s"));
/// registry.put(ProvenanceDraft::new(
///     "formation_energy", -6.823, Unit::parse("eV/atom"),
///     "structure_analysis", CallId::new("c1"),
/// )).unwrap();
///
/// let gate = RenderGate::default_config();
/// let output = gate.render("TiO2 has a formation energy of -6.82 eV/atom", &registry);
/// assert!(!output.blocked);
/// assert_eq!(output.decisions[0].outcome, RenderOutcome::Allow);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RenderGate {
    config: GateConfig,
}

impl RenderGate {
    /// Create a gate with the given configuration
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Create a gate after validating the configuration
    pub fn try_new(config: GateConfig) -> Result<Self, GatekeeperError> {
        config.validate().map_err(GatekeeperError::Config)?;
        Ok(Self::new(config))
    }

    /// Create a gate with default configuration
    pub fn default_config() -> Self {
        Self::new(GateConfig::default())
    }

    /// Configuration in use
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Gate a draft response against the session's registry
    pub fn render<S: ProvenanceStore>(&self, text: &str, store: &S) -> GateOutput {
        let tolerance = self.config.tolerance();
        let registry_empty = store.is_empty();

        let decisions: Vec<RenderDecision> = scan(text)
            .into_iter()
            .map(|candidate| {
                if candidate.kind == ClaimKind::Narrative {
                    return decide(text, &candidate, RenderOutcome::Allow, None);
                }
                let matched = store.find_matching(candidate.value, &tolerance, &|entry: &ProvenanceEntry| {
                    compatible(&candidate, entry)
                });
                match matched {
                    Some(entry) => decide(text, &candidate, RenderOutcome::Allow, Some(entry)),
                    None => {
                        let outcome = if registry_empty || self.config.strictness == StrictnessPolicy::Block {
                            RenderOutcome::Block
                        } else {
                            RenderOutcome::Redact
                        };
                        warn!(
                            "Unverified claim '{}' ({}): {}",
                            &text[candidate.span.start..candidate.span.end],
                            candidate.unit_or_keyword(),
                            outcome
                        );
                        decide(text, &candidate, outcome, None)
                    }
                }
            })
            .collect();

        let blocked = decisions.iter().any(|d| d.outcome == RenderOutcome::Block);
        let sanitized_text = if blocked {
            self.config.block_notice.clone()
        } else {
            self.rewrite(text, &decisions)
        };

        debug!(
            "Rendered {} claims: blocked={}, redacted={}",
            decisions.len(),
            blocked,
            decisions.iter().filter(|d| d.outcome == RenderOutcome::Redact).count()
        );
        GateOutput {
            sanitized_text,
            decisions,
            blocked,
        }
    }

    /// Gate a draft response for a session that can no longer trust its
    /// registry: every number, narrative or not, is blocked
    pub fn render_halted(&self, text: &str) -> GateOutput {
        let decisions: Vec<RenderDecision> = scan(text)
            .iter()
            .map(|candidate| decide(text, candidate, RenderOutcome::Block, None))
            .collect();
        let has_number = tokenize(text)
            .iter()
            .any(|token| matches!(token.kind, TokenKind::Number(_)));

        if has_number {
            warn!("Session halted: withholding response with {} numeric claims", decisions.len());
            GateOutput {
                sanitized_text: self.config.block_notice.clone(),
                decisions,
                blocked: true,
            }
        } else {
            GateOutput {
                sanitized_text: text.to_string(),
                decisions,
                blocked: false,
            }
        }
    }

    /// Apply redactions and inline citations
    fn rewrite(&self, text: &str, decisions: &[RenderDecision]) -> String {
        let mut output = String::with_capacity(text.len());
        let mut cursor = 0;

        for decision in decisions {
            let TextSpan { start, end } = decision.text_span;
            match decision.outcome {
                RenderOutcome::Redact => {
                    output.push_str(&text[cursor..start]);
                    output.push_str(&self.config.redaction_placeholder);
                    cursor = end;
                }
                RenderOutcome::Allow if self.config.inline_citations => {
                    if let Some(citation) = &decision.citation {
                        output.push_str(&text[cursor..end]);
                        if !text[end..].trim_start().starts_with("[source:") {
                            output.push_str(&format!(" {}", citation));
                        }
                        cursor = end;
                    }
                }
                _ => {}
            }
        }

        output.push_str(&text[cursor..]);
        output
    }
}

fn compatible(candidate: &ClaimCandidate, entry: &ProvenanceEntry) -> bool {
    let unit_ok = candidate
        .unit
        .is_none_or(|unit| entry.unit().is_known() && lexicon::units_equivalent(unit, entry.unit().as_str()));
    let property_ok = candidate
        .keyword
        .as_ref()
        .is_none_or(|keyword| lexicon::property_compatible(keyword.property, entry.property_name()));
    unit_ok && property_ok
}

fn decide(
    text: &str,
    candidate: &ClaimCandidate,
    outcome: RenderOutcome,
    entry: Option<&ProvenanceEntry>,
) -> RenderDecision {
    RenderDecision {
        text_span: candidate.span,
        span_text: text[candidate.span.start..candidate.span.end].to_string(),
        candidate_value: candidate.value,
        candidate_unit_or_keyword: candidate.unit_or_keyword(),
        claim_kind: candidate.kind,
        outcome,
        matched_entry_ref: entry.map(|e| e.entry_ref()),
        citation: entry.map(|e| Citation {
            entry_ref: e.entry_ref(),
            source_tool: e.source_tool().to_string(),
            call_id: e.call_id().clone(),
            timestamp: e.timestamp(),
        }),
    }
}
