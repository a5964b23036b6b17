//! Tool invocation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Host-assigned identifier of one tool call
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Wrap a host call id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a tool identity was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// The host reported a concrete, known tool name
    Declared,

    /// Inferred from the structural signature of the payload
    Signature,
}

/// Outcome of tool identity detection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectedTool {
    /// The output was attributed to a known tool
    Attributed {
        /// Tool name
        tool: String,
        /// How the attribution was made
        source: DetectionSource,
    },

    /// No signature matched; the output is excluded from extraction
    Unattributed,
}

impl DetectedTool {
    /// Attribute by structural signature
    pub fn by_signature(tool: impl Into<String>) -> Self {
        DetectedTool::Attributed {
            tool: tool.into(),
            source: DetectionSource::Signature,
        }
    }

    /// Attribute by the host's declared tool name
    pub fn declared(tool: impl Into<String>) -> Self {
        DetectedTool::Attributed {
            tool: tool.into(),
            source: DetectionSource::Declared,
        }
    }

    /// Tool name, if attributed
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            DetectedTool::Attributed { tool, .. } => Some(tool),
            DetectedTool::Unattributed => None,
        }
    }

    /// Whether the output may feed value extraction
    pub fn is_attributed(&self) -> bool {
        matches!(self, DetectedTool::Attributed { .. })
    }

    /// Tool name or `unattributed`, for logs
    pub fn label(&self) -> &str {
        self.tool_name().unwrap_or("unattributed")
    }
}

/// Record of one tool call's output and its detected identity
///
/// Read-only after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    call_id: CallId,
    reported_tool_name: Option<String>,
    detected_tool: DetectedTool,
    raw_output: Value,
    detected_at: DateTime<Utc>,
}

impl ToolInvocationRecord {
    /// Create a record
    pub fn new(
        call_id: CallId,
        reported_tool_name: Option<String>,
        detected_tool: DetectedTool,
        raw_output: Value,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            call_id,
            reported_tool_name,
            detected_tool,
            raw_output,
            detected_at,
        }
    }

    /// The call this record describes
    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    /// Tool name the host reported (often a generic label)
    pub fn reported_tool_name(&self) -> Option<&str> {
        self.reported_tool_name.as_deref()
    }

    /// Detected identity
    pub fn detected_tool(&self) -> &DetectedTool {
        &self.detected_tool
    }

    /// Output exactly as received, before unwrapping
    pub fn raw_output(&self) -> &Value {
        &self.raw_output
    }

    /// Detection time
    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detected_tool_labels() {
        assert_eq!(DetectedTool::by_signature("energy_calculator").label(), "energy_calculator");
        assert_eq!(DetectedTool::Unattributed.label(), "unattributed");
        assert!(!DetectedTool::Unattributed.is_attributed());
    }

    #[test]
    fn test_detected_tool_serialization() {
        let value = serde_json::to_value(DetectedTool::declared("database_lookup")).unwrap();
        assert_eq!(
            value,
            json!({"status": "attributed", "tool": "database_lookup", "source": "declared"})
        );
    }

    #[test]
    fn test_record_accessors() {
        let record = ToolInvocationRecord::new(
            CallId::new("c1"),
            Some("tool".to_string()),
            DetectedTool::Unattributed,
            json!({"x": 1}),
            Utc::now(),
        );
        assert_eq!(record.call_id().as_str(), "c1");
        assert_eq!(record.reported_tool_name(), Some("tool"));
        assert_eq!(record.raw_output()["x"], 1);
    }
}
