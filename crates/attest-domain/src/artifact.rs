//! File artifacts produced by tools

use crate::invocation::CallId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a tracked artifact (UUIDv7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(uuid::Uuid);

impl ArtifactId {
    /// Generate a new id
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercase hex digest of an artifact's content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an already computed hex digest
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A generated file and the tool call that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique id
    pub artifact_id: ArtifactId,

    /// Path or name the tool gave the file
    pub content_reference: String,

    /// Stable hash of the content
    pub content_hash: ContentHash,

    /// Invocation that produced the file
    pub produced_by: CallId,

    /// Tool that produced the file
    pub tool: String,

    /// Structure the file describes, when the tool said so
    pub structure_id: Option<String>,

    /// When the artifact was recorded
    pub created_at: DateTime<Utc>,
}
