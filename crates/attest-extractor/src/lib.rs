//! Attest Extractor
//!
//! Turns raw tool outputs into provenance drafts.
//!
//! # Architecture
//!
//! ```text
//! raw output → unwrap → detect tool → extract (join / records / flat) → drafts
//! ```
//!
//! - **Unwrapping**: JSON-in-string, code fences, `content` blocks and
//!   single-key wrappers are peeled up to a bounded depth
//! - **Detection**: an ordered table of structural signatures identifies the
//!   producing tool when the host only reports a generic label
//! - **Extraction**: per-tool profiles declare how values are laid out and
//!   which unit each documented property carries
//!
//! All stages are pure; the caller records audit events between them.
//!
//! # Example Usage
//!
//! ```
//! use attest_domain::CallId;
//! use attest_extractor::Extractor;
//! use serde_json::json;
//!
//! let extractor = Extractor::default();
//! let raw = json!({
//!     "generated_structures": [{"composition": "TiO2", "structures": [{}]}],
//!     "energy_calculations": [{"structure_id": "TiO2_struct_1", "formation_energy": -6.823}]
//! });
//!
//! let processed = extractor.process(Some("tool"), &CallId::new("c1"), &raw).unwrap();
//! assert_eq!(processed.detection.tool.tool_name(), Some("structure_analysis"));
//!
//! let drafts = processed.extraction.unwrap().drafts;
//! assert_eq!(drafts.len(), 1);
//! assert_eq!(drafts[0].unit.as_str(), "eV/atom");
//! ```

#![warn(missing_docs)]

mod config;
pub mod detector;
mod error;
mod extractor;
pub mod profile;
mod types;
pub mod unwrap;

#[cfg(test)]
mod tests;

pub use config::ExtractorConfig;
pub use detector::{Detection, DetectionAmbiguity, Signature, SignatureTable, ToolDetector};
pub use error::ExtractorError;
pub use extractor::{Extractor, ValueExtractor};
pub use profile::{ExtractionProfile, ExtractionStrategy, ProfileSet};
pub use types::{
    ArtifactDescriptor, ExtractionResult, ProcessedOutput, UnknownUnit, Unpaired, UnpairedSide,
};
pub use unwrap::{unwrap_output, UnwrapError, Unwrapped};
