//! Attest Pipeline
//!
//! Wires the extractor, registry, render gate and journal into
//! provenance-enforcing sessions, and runs them concurrently.
//!
//! # Overview
//!
//! - [`Session`]: synchronous core; handles one [`HostEvent`] at a time
//! - [`SessionWorker`]: owns a session and drains its event channel
//! - [`Dispatcher`]: routes a mixed host stream to one worker per session
//!
//! ## Event flow
//!
//! | Event | Effect |
//! |-------|--------|
//! | `tool_call_start` | Remembers the declared tool name; `tool_call_start` record |
//! | `tool_call_output` | Unwrap, detect, extract, hash artifacts, commit as one batch |
//! | `assistant_text_chunk` | Appended to the pending response |
//! | `final_message` | Pending response (or the given text) goes through the render gate |
//!
//! A registry or audit write failure halts the session: later tool outputs
//! are ignored and every response containing a number is withheld.
//!
//! # Usage
//!
//! ```
//! use attest_domain::{RenderOutcome, SessionContext, SessionId};
//! use attest_journal::MemorySink;
//! use attest_pipeline::{HostEvent, PipelineConfig, Session};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::new(
//!     SessionContext::new(SessionId::new("s-1")),
//!     &PipelineConfig::default(),
//!     Box::new(MemorySink::new()),
//! )?;
//!
//! session.handle(HostEvent::tool_call_output("s-1", "c1", json!({
//!     "generated_structures": [{"composition": "TiO2", "structures": [{}]}],
//!     "energy_calculations": [{"structure_id": "TiO2_struct_1", "formation_energy": -6.823}]
//! })))?;
//!
//! let output = session
//!     .handle(HostEvent::final_message("s-1", Some("TiO2 has a formation energy of -6.82 eV/atom")))?
//!     .ok_or("no output")?;
//! assert_eq!(output.decisions[0].outcome, RenderOutcome::Allow);
//!
//! let report = session.finish();
//! assert_eq!(report.entries.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! strictness = "block"
//! relative_tolerance = 0.005
//! absolute_tolerance = 0.001
//! max_unwrap_depth = 5
//! inline_citations = false
//! channel_capacity = 256
//! ```

#![warn(missing_docs)]

mod config;
mod dispatcher;
mod error;
mod event;
mod metrics;
mod session;
mod worker;

pub use config::PipelineConfig;
pub use dispatcher::{Dispatcher, SinkFactory};
pub use error::PipelineError;
pub use event::{EventBody, FinalMessage, HostEvent, TextChunk, ToolCallOutput, ToolCallStart};
pub use metrics::SessionMetrics;
pub use session::{Session, SessionReport, SessionStatus};
pub use worker::{spawn_session, RenderedMessage, SessionHandle, SessionWorker};
