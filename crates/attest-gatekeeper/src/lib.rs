//! Attest Gatekeeper
//!
//! The render gate: every numeric claim in model-generated text must trace
//! to a registered tool computation before the text reaches the user.
//!
//! The Gatekeeper provides:
//! - A finite-state scanner that finds numbers and associates units and
//!   property keywords with them
//! - A fixed, auditable lexicon of units, synonyms, property keywords,
//!   count nouns and narrative cues
//! - Registry lookup within tolerance, with citations for verified values
//! - Redaction or blocking of everything else, failing closed
//!
//! # Examples
//!
//! ```
//! use attest_domain::{RenderOutcome, SessionId};
//! use attest_gatekeeper::{GateConfig, RenderGate};
//! use attest_registry::ValueRegistry;
//!
//! let registry = ValueRegistry::new(SessionId::new("s"));
//! let gate = RenderGate::new(GateConfig::lenient());
//!
//! // Nothing was computed, so a property claim cannot be shown
//! let output = gate.render("The bandgap is approximately 1.5 eV", &registry);
//! assert!(output.blocked);
//! assert!(!output.sanitized_text.contains("1.5"));
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod gate;
pub mod lexicon;
pub mod scanner;

pub use config::{GateConfig, StrictnessPolicy, BLOCK_NOTICE, REDACTION_PLACEHOLDER};
pub use error::GatekeeperError;
pub use gate::{GateOutput, RenderGate};
pub use scanner::{scan, ClaimCandidate, KeywordMatch};
