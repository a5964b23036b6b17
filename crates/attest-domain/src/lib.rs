//! Attest Domain Layer
//!
//! This crate contains the data model of the provenance-enforcement pipeline.
//! It defines the value objects every other crate exchanges and the trait
//! interface of the provenance store, and performs no I/O.
//!
//! ## Key Concepts
//!
//! - **Provenance entry**: a numeric property value traced to the tool call that computed it
//! - **Tool invocation record**: what a tool returned and which tool we believe it was
//! - **Artifact**: a file produced by a tool, identified by its content hash
//! - **Audit event**: one line of the append-only audit trail
//! - **Render decision**: the gate's verdict on one numeric claim in outgoing text
//! - **Session context**: the explicit session scope threaded through every call
//!
//! ## Architecture
//!
//! - Pure data and comparison logic only
//! - Storage, logging and scanning live in other crates
//! - Trait definitions for the seams between them

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod audit;
pub mod decision;
pub mod invocation;
pub mod provenance;
pub mod session;
pub mod tolerance;
pub mod traits;
pub mod unit;

// Re-exports for convenience
pub use artifact::{Artifact, ArtifactId, ContentHash};
pub use audit::{AuditEvent, AuditEventType, AuditLevel};
pub use decision::{Citation, ClaimKind, RenderDecision, RenderOutcome, TextSpan};
pub use invocation::{CallId, DetectedTool, DetectionSource, ToolInvocationRecord};
pub use provenance::{EntryKey, EntryRef, ProvenanceDraft, ProvenanceEntry};
pub use session::{SessionContext, SessionId};
pub use tolerance::Tolerance;
pub use unit::{Unit, UNIT_UNKNOWN};
