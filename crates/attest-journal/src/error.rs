//! Journal error types

use thiserror::Error;

/// Errors that can occur while journaling
#[derive(Error, Debug)]
pub enum JournalError {
    /// Writing an audit record failed; session-fatal
    #[error("Audit log write failed: {0}")]
    LogWrite(#[source] std::io::Error),

    /// A previous write failed and the logger refuses further records
    #[error("Audit log halted after an earlier write failure")]
    Halted,

    /// An audit record could not be serialized
    #[error("Audit record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An artifact file could not be read
    #[error("Artifact read failed for {path}: {source}")]
    ArtifactRead {
        /// Path that was read
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl JournalError {
    /// Whether the error breaks audit continuity
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            JournalError::LogWrite(_) | JournalError::Halted | JournalError::Serialization(_)
        )
    }
}
