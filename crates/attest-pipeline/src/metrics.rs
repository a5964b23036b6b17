//! Per-session counters

use attest_domain::RenderOutcome;
use std::collections::HashMap;

/// Counters collected while a session runs
///
/// Tracks tool calls, committed values and render outcomes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetrics {
    /// Tool outputs received
    pub tool_calls: usize,

    /// Tool outputs excluded (no output, unwrap failure, unattributed, extraction failure)
    pub excluded_calls: usize,

    /// Values committed to the registry
    pub values_committed: usize,

    /// Recomputations that replaced a different value
    pub conflicts: usize,

    /// Join rows or values that produced no entry
    pub unpaired: usize,

    /// Artifacts hashed
    pub artifacts: usize,

    /// Final messages rendered
    pub renders: usize,

    /// Render decisions per outcome
    pub decisions: HashMap<RenderOutcome, usize>,
}

impl SessionMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tool output
    pub fn record_tool_call(&mut self) {
        self.tool_calls += 1;
    }

    /// Record an excluded tool output
    pub fn record_excluded(&mut self) {
        self.excluded_calls += 1;
    }

    /// Record a render and its decisions
    pub fn record_render(&mut self, outcomes: impl IntoIterator<Item = RenderOutcome>) {
        self.renders += 1;
        for outcome in outcomes {
            *self.decisions.entry(outcome).or_insert(0) += 1;
        }
    }

    /// Decisions with a given outcome, across all renders
    pub fn decisions_with(&self, outcome: RenderOutcome) -> usize {
        self.decisions.get(&outcome).copied().unwrap_or(0)
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Session Metrics Summary".to_string(),
            "=======================".to_string(),
            format!("Tool calls: {} ({} excluded)", self.tool_calls, self.excluded_calls),
            format!("Values committed: {}", self.values_committed),
            format!("Duplicate key conflicts: {}", self.conflicts),
            format!("Unpaired values: {}", self.unpaired),
            format!("Artifacts: {}", self.artifacts),
            format!("Renders: {}", self.renders),
        ];

        if !self.decisions.is_empty() {
            lines.push("Decisions:".to_string());
            for outcome in [RenderOutcome::Allow, RenderOutcome::Redact, RenderOutcome::Block] {
                let count = self.decisions_with(outcome);
                if count > 0 {
                    lines.push(format!("  {:?}: {}", outcome, count));
                }
            }
        }

        lines.join("\n")
    }
}
