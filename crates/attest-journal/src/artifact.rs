//! Artifact tracking with stable content hashes

use crate::error::JournalError;
use attest_domain::{Artifact, ArtifactId, CallId, ContentHash};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// SHA-256 of `bytes`, lowercase hex
///
/// # Examples
///
/// ```
/// use attest_journal::content_hash;
///
/// let hash = content_hash(b"");
/// assert!(hash.as_str().starts_with("e3b0c442"));
/// ```
pub fn content_hash(bytes: &[u8]) -> ContentHash {
    ContentHash::from_hex(hex::encode(Sha256::digest(bytes)))
}

/// Records generated files and the tool calls that produced them
#[derive(Debug, Clone, Default)]
pub struct ArtifactTracker {
    artifacts: Vec<Artifact>,
}

impl ArtifactTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash and record an artifact whose content is in memory
    pub fn record(
        &mut self,
        content_reference: impl Into<String>,
        content: &[u8],
        produced_by: CallId,
        tool: impl Into<String>,
        structure_id: Option<String>,
    ) -> &Artifact {
        let artifact = Artifact {
            artifact_id: ArtifactId::new(),
            content_reference: content_reference.into(),
            content_hash: content_hash(content),
            produced_by,
            tool: tool.into(),
            structure_id,
            created_at: Utc::now(),
        };
        debug!(
            "Recorded artifact {} ({}) from call {}",
            artifact.content_reference, artifact.content_hash, artifact.produced_by
        );
        self.artifacts.push(artifact);
        let index = self.artifacts.len() - 1;
        &self.artifacts[index]
    }

    /// Read, hash and record an artifact from disk
    pub fn record_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        produced_by: CallId,
        tool: impl Into<String>,
        structure_id: Option<String>,
    ) -> Result<&Artifact, JournalError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|source| JournalError::ArtifactRead {
            path: path.display().to_string(),
            source,
        })?;
        Ok(self.record(path.display().to_string(), &content, produced_by, tool, structure_id))
    }

    /// Every recorded artifact, in order
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Artifacts produced by one call
    pub fn for_call<'a>(&'a self, call_id: &'a CallId) -> impl Iterator<Item = &'a Artifact> + 'a {
        self.artifacts.iter().filter(move |artifact| &artifact.produced_by == call_id)
    }

    /// Hash to attach to a value computed by `call_id` for `structure_id`
    ///
    /// An artifact scoped to the same structure wins. Otherwise, when the call
    /// produced exactly one unscoped artifact, that artifact backs every value
    /// of the call. Anything else is ambiguous and yields `None`.
    pub fn hash_for(&self, call_id: &CallId, structure_id: Option<&str>) -> Option<ContentHash> {
        if let Some(structure) = structure_id {
            let scoped = self
                .for_call(call_id)
                .find(|artifact| artifact.structure_id.as_deref() == Some(structure));
            if let Some(artifact) = scoped {
                return Some(artifact.content_hash.clone());
            }
        }

        let mut unscoped = self
            .for_call(call_id)
            .filter(|artifact| artifact.structure_id.is_none());
        match (unscoped.next(), unscoped.next()) {
            (Some(only), None) => Some(only.content_hash.clone()),
            _ => None,
        }
    }

    /// Number of recorded artifacts
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
