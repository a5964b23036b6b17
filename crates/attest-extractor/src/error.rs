//! Error types for the Extractor

use crate::unwrap::UnwrapError;
use thiserror::Error;

/// Errors that can occur while turning a tool output into drafts
///
/// None of these is fatal for a session: the affected call is logged and
/// excluded from extraction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// The transport envelopes could not be removed
    #[error("Unwrap error: {0}")]
    Unwrap(#[from] UnwrapError),

    /// No tool identity could be established
    #[error("Output is unattributed; excluded from extraction")]
    Unattributed,

    /// The tool is known but has no extraction profile
    #[error("No extraction profile for tool '{0}'")]
    NoProfile(String),

    /// The payload does not have the shape the profile expects
    #[error("Invalid payload format: {0}")]
    InvalidFormat(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
