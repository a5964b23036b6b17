//! Result types for extraction

use crate::detector::Detection;
use attest_domain::ProvenanceDraft;
use serde::Serialize;
use serde_json::Value;

/// Which side of a join an unpaired item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnpairedSide {
    /// A structure with no property element
    Structure,
    /// A property element with no structure
    Property,
}

/// An item that could not be paired during a join
///
/// Unpaired items never receive a value; they are reported so the audit
/// trail shows what the tool left incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unpaired {
    /// Structure id, or a positional placeholder when the element had none
    pub structure_id: String,
    /// Side of the join
    pub side: UnpairedSide,
    /// Short reason
    pub reason: String,
}

/// A value committed without a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownUnit {
    /// Property name
    pub property_name: String,
    /// Structure the value belongs to
    pub structure_id: Option<String>,
}

/// A file produced by a tool, as described in its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    /// Path or name of the file
    pub reference: String,
    /// Inline content, when the tool embedded it
    pub content: Option<String>,
    /// Structure the file describes
    pub structure_id: Option<String>,
}

/// Everything extracted from one tool output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    /// Values ready for commit, in payload order
    pub drafts: Vec<ProvenanceDraft>,
    /// Join leftovers
    pub unpaired: Vec<Unpaired>,
    /// Drafts whose unit could not be sourced
    pub unknown_units: Vec<UnknownUnit>,
    /// File artifacts the tool reported
    pub artifacts: Vec<ArtifactDescriptor>,
}

impl ExtractionResult {
    /// Whether nothing at all was extracted
    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty() && self.unpaired.is_empty() && self.artifacts.is_empty()
    }
}

/// A tool output after unwrapping, detection and extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedOutput {
    /// Innermost structured payload
    pub payload: Value,
    /// Envelopes removed
    pub layers: usize,
    /// Tool identity
    pub detection: Detection,
    /// Extracted values; `None` when the output is unattributed
    pub extraction: Option<ExtractionResult>,
}
