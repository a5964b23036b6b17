//! Provenance entries - the facts the render gate is allowed to repeat

use crate::invocation::CallId;
use crate::session::SessionId;
use crate::unit::Unit;
use crate::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session-scoped reference to a committed entry (`E1`, `E2`, ...)
///
/// References are assigned in commit order, so comparing two references
/// tells which entry was committed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryRef(u64);

impl EntryRef {
    /// Create a reference from its commit sequence number
    pub fn from_seq(seq: u64) -> Self {
        Self(seq)
    }

    /// The commit sequence number
    pub fn seq(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Identity of a provenance fact within a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    /// Owning session
    pub session_id: SessionId,

    /// Property name as reported by the tool (e.g. `formation_energy`)
    pub property_name: String,

    /// Structure the property belongs to, if the tool scoped it
    pub structure_id: Option<String>,
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.structure_id {
            Some(structure) => write!(f, "{}/{}@{}", self.session_id, self.property_name, structure),
            None => write!(f, "{}/{}", self.session_id, self.property_name),
        }
    }
}

/// An extracted value that has not been committed yet
///
/// Drafts live only inside the processing of one tool output. If the session
/// is aborted before they are committed they are simply dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvenanceDraft {
    /// Property name as reported by the tool
    pub property_name: String,

    /// Raw value, never rounded or converted
    pub value: f64,

    /// Unit sourced from the payload or the tool contract
    pub unit: Unit,

    /// Tool the value came from
    pub source_tool: String,

    /// Invocation that produced the value
    pub call_id: CallId,

    /// Structure the property belongs to
    pub structure_id: Option<String>,

    /// Hash of the file artifact backing the value, if any
    pub artifact_hash: Option<ContentHash>,
}

impl ProvenanceDraft {
    /// Create a draft without structure scope or artifact
    pub fn new(
        property_name: impl Into<String>,
        value: f64,
        unit: Unit,
        source_tool: impl Into<String>,
        call_id: CallId,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            value,
            unit,
            source_tool: source_tool.into(),
            call_id,
            structure_id: None,
            artifact_hash: None,
        }
    }

    /// Scope the draft to a structure
    pub fn with_structure(mut self, structure_id: impl Into<String>) -> Self {
        self.structure_id = Some(structure_id.into());
        self
    }

    /// Attach the hash of the artifact the value derives from
    pub fn with_artifact(mut self, hash: ContentHash) -> Self {
        self.artifact_hash = Some(hash);
        self
    }

    /// The key this draft will occupy once committed to `session_id`
    pub fn key(&self, session_id: &SessionId) -> EntryKey {
        EntryKey {
            session_id: session_id.clone(),
            property_name: self.property_name.clone(),
            structure_id: self.structure_id.clone(),
        }
    }

    /// Freeze the draft into a committed entry
    pub fn commit(
        self,
        entry_ref: EntryRef,
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    ) -> ProvenanceEntry {
        ProvenanceEntry {
            entry_ref,
            property_name: self.property_name,
            value: self.value,
            unit: self.unit,
            source_tool: self.source_tool,
            call_id: self.call_id,
            artifact_hash: self.artifact_hash,
            timestamp,
            session_id,
            structure_id: self.structure_id,
        }
    }
}

/// A committed provenance fact
///
/// Entries are immutable: fields are only readable. A recomputation of the
/// same key produces a new entry that supersedes this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    entry_ref: EntryRef,
    property_name: String,
    value: f64,
    unit: Unit,
    source_tool: String,
    call_id: CallId,
    artifact_hash: Option<ContentHash>,
    timestamp: DateTime<Utc>,
    session_id: SessionId,
    structure_id: Option<String>,
}

impl ProvenanceEntry {
    /// Session-scoped reference assigned at commit
    pub fn entry_ref(&self) -> EntryRef {
        self.entry_ref
    }

    /// Property name as reported by the tool
    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    /// The computed value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Unit of the value
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Tool that computed the value
    pub fn source_tool(&self) -> &str {
        &self.source_tool
    }

    /// Invocation that computed the value
    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    /// Hash of the backing artifact
    pub fn artifact_hash(&self) -> Option<&ContentHash> {
        self.artifact_hash.as_ref()
    }

    /// Commit time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Owning session
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Structure the property belongs to
    pub fn structure_id(&self) -> Option<&str> {
        self.structure_id.as_deref()
    }

    /// The entry's registry key
    pub fn key(&self) -> EntryKey {
        EntryKey {
            session_id: self.session_id.clone(),
            property_name: self.property_name.clone(),
            structure_id: self.structure_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProvenanceDraft {
        ProvenanceDraft::new(
            "formation_energy",
            -6.823,
            Unit::parse("eV/atom"),
            "structure_analysis",
            CallId::new("call-1"),
        )
        .with_structure("TiO2_struct_1")
    }

    #[test]
    fn test_entry_ref_display() {
        assert_eq!(EntryRef::from_seq(3).to_string(), "E3");
        assert!(EntryRef::from_seq(1) < EntryRef::from_seq(2));
    }

    #[test]
    fn test_commit_preserves_fields() {
        let session = SessionId::new("s-1");
        let now = Utc::now();
        let entry = draft().commit(EntryRef::from_seq(1), session.clone(), now);

        assert_eq!(entry.property_name(), "formation_energy");
        assert_eq!(entry.value(), -6.823);
        assert_eq!(entry.unit().as_str(), "eV/atom");
        assert_eq!(entry.structure_id(), Some("TiO2_struct_1"));
        assert_eq!(entry.call_id().as_str(), "call-1");
        assert_eq!(entry.timestamp(), now);
        assert_eq!(entry.key(), draft().key(&session));
    }

    #[test]
    fn test_key_display() {
        let key = draft().key(&SessionId::new("s-1"));
        assert_eq!(key.to_string(), "s-1/formation_energy@TiO2_struct_1");
    }
}
