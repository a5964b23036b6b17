//! Error types for pipeline operations

use attest_journal::JournalError;
use attest_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur while running a session
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The audit log could not be written
    #[error("Audit log error: {0}")]
    Journal(#[from] JournalError),

    /// The registry refused a batch
    #[error("Registry write failure: {0}")]
    Registry(#[from] RegistryError),

    /// An event was routed to the wrong session
    #[error("Event for session '{found}' delivered to session '{expected}'")]
    SessionMismatch {
        /// Session that received the event
        expected: String,
        /// Session named by the event
        found: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The session worker is gone
    #[error("Worker error: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Whether the error halts the session
    ///
    /// A registry or audit log that failed a write can no longer back a
    /// render decision, so numeric rendering fails closed from then on.
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Journal(e) => e.is_fatal(),
            PipelineError::Registry(_) => true,
            _ => false,
        }
    }
}
