//! Audit events - the durable record of every pipeline stage
//!
//! The on-disk shape is one JSON object per line with exactly three fields:
//! `event_type`, `timestamp` (RFC 3339, UTC) and `payload`. Downstream audit
//! tooling depends on these names, so they must not change.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A session was opened
    SessionStart,
    /// The host started a tool call
    ToolCallStart,
    /// A tool call finished; carries the detected identity
    ToolCallEnd,
    /// A tool call produced no output (timeout, error, null)
    ToolCallNoOutput,
    /// The output could not be unwrapped
    UnwrapError,
    /// Several tool signatures matched one payload
    DetectionAmbiguity,
    /// An attributed payload did not have the shape its profile expects
    ExtractionError,
    /// A value was committed to the registry
    ValueExtracted,
    /// A value was committed without a unit
    UnitUnknown,
    /// A structure or property could not be joined
    UnpairedValue,
    /// A recomputation replaced a different value
    DuplicateKeyConflict,
    /// A file artifact was hashed and recorded
    ArtifactRecorded,
    /// The render gate decided on one numeric claim
    RenderDecision,
    /// A render pass finished
    RenderComplete,
    /// A fatal write failure halted the session
    SessionHalted,
    /// Uncommitted drafts were dropped on abort
    DraftsDiscarded,
    /// The session ended
    SessionEnd,
}

impl AuditEventType {
    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::SessionStart => "session_start",
            AuditEventType::ToolCallStart => "tool_call_start",
            AuditEventType::ToolCallEnd => "tool_call_end",
            AuditEventType::ToolCallNoOutput => "tool_call_no_output",
            AuditEventType::UnwrapError => "unwrap_error",
            AuditEventType::DetectionAmbiguity => "detection_ambiguity",
            AuditEventType::ExtractionError => "extraction_error",
            AuditEventType::ValueExtracted => "value_extracted",
            AuditEventType::UnitUnknown => "unit_unknown",
            AuditEventType::UnpairedValue => "unpaired_value",
            AuditEventType::DuplicateKeyConflict => "duplicate_key_conflict",
            AuditEventType::ArtifactRecorded => "artifact_recorded",
            AuditEventType::RenderDecision => "render_decision",
            AuditEventType::RenderComplete => "render_complete",
            AuditEventType::SessionHalted => "session_halted",
            AuditEventType::DraftsDiscarded => "drafts_discarded",
            AuditEventType::SessionEnd => "session_end",
        }
    }

    /// Default severity for the event type
    pub fn default_level(&self) -> AuditLevel {
        match self {
            AuditEventType::DetectionAmbiguity
            | AuditEventType::UnpairedValue
            | AuditEventType::DuplicateKeyConflict
            | AuditEventType::UnitUnknown
            | AuditEventType::UnwrapError
            | AuditEventType::ExtractionError
            | AuditEventType::ToolCallNoOutput
            | AuditEventType::DraftsDiscarded => AuditLevel::Warning,
            AuditEventType::SessionHalted => AuditLevel::Error,
            _ => AuditLevel::Info,
        }
    }
}

/// Severity recorded in the payload's `level` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    /// Normal progress
    Info,
    /// Degraded but non-fatal
    Warning,
    /// Session-fatal
    Error,
}

/// One audit record
///
/// Append-only: once written an event is never changed or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Kind of event
    pub event_type: AuditEventType,

    /// When the stage ran
    #[serde(with = "rfc3339")]
    pub timestamp: DateTime<Utc>,

    /// Stage-specific details
    pub payload: Value,
}

impl AuditEvent {
    /// Create an event
    pub fn new(event_type: AuditEventType, timestamp: DateTime<Utc>, payload: Value) -> Self {
        Self {
            event_type,
            timestamp,
            payload,
        }
    }

    /// Serialize to a single line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse one line of an audit log
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Severity from the payload, falling back to the type's default
    pub fn level(&self) -> AuditLevel {
        self.payload
            .get("level")
            .cloned()
            .and_then(|level| serde_json::from_value(level).ok())
            .unwrap_or_else(|| self.event_type.default_level())
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix
mod rfc3339 {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_line_has_exactly_three_fields() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let event = AuditEvent::new(AuditEventType::ToolCallStart, ts, json!({"call_id": "c1"}));
        let line = event.to_json_line().unwrap();

        assert!(!line.contains('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["event_type"], "tool_call_start");
        assert_eq!(obj["timestamp"], "2026-01-02T03:04:05.000Z");
        assert_eq!(obj["payload"]["call_id"], "c1");
    }

    #[test]
    fn test_line_round_trip() {
        let event = AuditEvent::new(AuditEventType::RenderDecision, Utc::now(), json!({"outcome": "ALLOW"}));
        let parsed = AuditEvent::from_json_line(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(parsed.event_type, AuditEventType::RenderDecision);
        assert_eq!(parsed.payload, event.payload);
    }

    #[test]
    fn test_level_defaults_and_overrides() {
        let event = AuditEvent::new(AuditEventType::DuplicateKeyConflict, Utc::now(), json!({}));
        assert_eq!(event.level(), AuditLevel::Warning);

        let event = AuditEvent::new(AuditEventType::ValueExtracted, Utc::now(), json!({"level": "error"}));
        assert_eq!(event.level(), AuditLevel::Error);
    }

    #[test]
    fn test_type_names_match_serde() {
        for event_type in [
            AuditEventType::SessionStart,
            AuditEventType::ToolCallNoOutput,
            AuditEventType::DuplicateKeyConflict,
            AuditEventType::DraftsDiscarded,
        ] {
            let wire = serde_json::to_value(event_type).unwrap();
            assert_eq!(wire, event_type.as_str());
        }
    }
}
