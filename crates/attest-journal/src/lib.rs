//! Attest Journal
//!
//! Audit trail and artifact bookkeeping for one session.
//!
//! The journal provides:
//! - An append-only [`EventLogger`] writing one JSON record per line
//! - Pluggable [`AuditSink`]s (append-mode file, in-memory)
//! - An [`ArtifactTracker`] hashing generated files with SHA-256
//!
//! A failed audit write is fatal for the session: once the logger has
//! failed it refuses every further write, so a gap in the trail can never
//! go unnoticed.
//!
//! # Examples
//!
//! ```
//! use attest_domain::{AuditEventType, SessionContext, SessionId};
//! use attest_journal::{EventLogger, MemorySink};
//! use serde_json::json;
//!
//! let sink = MemorySink::new();
//! let ctx = SessionContext::new(SessionId::new("s-1"));
//! let mut logger = EventLogger::new(&ctx, Box::new(sink.clone()));
//!
//! logger.record(AuditEventType::ToolCallStart, json!({"call_id": "c1"})).unwrap();
//! assert_eq!(sink.lines().unwrap().len(), 1);
//! ```

#![warn(missing_docs)]

mod artifact;
mod error;
mod logger;
mod sink;

pub use artifact::{content_hash, ArtifactTracker};
pub use error::JournalError;
pub use logger::EventLogger;
pub use sink::{AuditSink, FileSink, MemorySink, SharedSink};
