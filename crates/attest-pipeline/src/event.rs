//! Host event stream records
//!
//! The host orchestration layer emits one JSON object per event:
//! `{"type": ..., "session_id": ..., "timestamp": ..., "payload": {...}}`.

use attest_domain::{CallId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Statuses that mean a tool call produced nothing usable
const NO_OUTPUT_STATUSES: &[&str] = &["timeout", "error", "cancelled"];

/// The host started a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallStart {
    /// Call identifier
    pub call_id: CallId,
    /// Tool name as the host reports it
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Call arguments
    #[serde(default)]
    pub arguments: Value,
}

/// A tool call returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallOutput {
    /// Call identifier
    pub call_id: CallId,
    /// Tool name as the host reports it, if repeated here
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Raw output, any shape
    #[serde(default)]
    pub output: Value,
    /// Host-reported status (`ok`, `timeout`, `error`, ...)
    #[serde(default)]
    pub status: Option<String>,
}

impl ToolCallOutput {
    /// Whether the call timed out, failed or returned nothing
    pub fn is_no_output(&self) -> bool {
        let failed = self.status.as_deref().is_some_and(|status| {
            NO_OUTPUT_STATUSES
                .iter()
                .any(|s| s.eq_ignore_ascii_case(status.trim()))
        });
        failed || self.output.is_null()
    }
}

/// A streamed piece of the assistant's draft response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Text fragment
    pub text: String,
}

/// The assistant finished its response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinalMessage {
    /// Full text; when absent the streamed chunks of the turn are used
    #[serde(default)]
    pub text: Option<String>,
}

/// Event-specific part of a host event
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    /// `tool_call_start`
    ToolCallStart(ToolCallStart),
    /// `tool_call_output`
    ToolCallOutput(ToolCallOutput),
    /// `assistant_text_chunk`
    AssistantTextChunk(TextChunk),
    /// `final_message`
    FinalMessage(FinalMessage),
}

impl EventBody {
    /// Wire name of the event type
    pub fn type_name(&self) -> &'static str {
        match self {
            EventBody::ToolCallStart(_) => "tool_call_start",
            EventBody::ToolCallOutput(_) => "tool_call_output",
            EventBody::AssistantTextChunk(_) => "assistant_text_chunk",
            EventBody::FinalMessage(_) => "final_message",
        }
    }
}

/// One event from the host stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent", into = "RawEvent")]
pub struct HostEvent {
    /// Session the event belongs to
    pub session_id: SessionId,
    /// When the host emitted the event
    pub timestamp: DateTime<Utc>,
    /// Event-specific data
    pub body: EventBody,
}

impl HostEvent {
    /// Build an event stamped now
    pub fn new(session_id: impl Into<SessionId>, body: EventBody) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            body,
        }
    }

    /// `tool_call_start` event
    pub fn tool_call_start(session_id: &str, call_id: &str, tool_name: &str) -> Self {
        Self::new(
            session_id,
            EventBody::ToolCallStart(ToolCallStart {
                call_id: CallId::new(call_id),
                tool_name: Some(tool_name.to_string()),
                arguments: Value::Null,
            }),
        )
    }

    /// `tool_call_output` event
    pub fn tool_call_output(session_id: &str, call_id: &str, output: Value) -> Self {
        Self::new(
            session_id,
            EventBody::ToolCallOutput(ToolCallOutput {
                call_id: CallId::new(call_id),
                tool_name: None,
                output,
                status: None,
            }),
        )
    }

    /// `assistant_text_chunk` event
    pub fn text_chunk(session_id: &str, text: &str) -> Self {
        Self::new(
            session_id,
            EventBody::AssistantTextChunk(TextChunk {
                text: text.to_string(),
            }),
        )
    }

    /// `final_message` event
    pub fn final_message(session_id: &str, text: Option<&str>) -> Self {
        Self::new(
            session_id,
            EventBody::FinalMessage(FinalMessage {
                text: text.map(str::to_string),
            }),
        )
    }

    /// Parse one line of a recorded host stream
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Serialize as one line of a host stream
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Serialize, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    session_id: SessionId,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<RawEvent> for HostEvent {
    type Error = String;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        fn payload<T: serde::de::DeserializeOwned>(kind: &str, value: Value) -> Result<T, String> {
            serde_json::from_value(value).map_err(|e| format!("invalid {} payload: {}", kind, e))
        }

        let payload_value = match raw.payload {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let body = match raw.event_type.as_str() {
            "tool_call_start" => EventBody::ToolCallStart(payload(&raw.event_type, payload_value)?),
            "tool_call_output" => EventBody::ToolCallOutput(payload(&raw.event_type, payload_value)?),
            "assistant_text_chunk" => {
                EventBody::AssistantTextChunk(payload(&raw.event_type, payload_value)?)
            }
            "final_message" => EventBody::FinalMessage(payload(&raw.event_type, payload_value)?),
            other => return Err(format!("unknown event type '{}'", other)),
        };

        Ok(HostEvent {
            session_id: raw.session_id,
            timestamp: raw.timestamp,
            body,
        })
    }
}

impl From<HostEvent> for RawEvent {
    fn from(event: HostEvent) -> Self {
        let event_type = event.body.type_name().to_string();
        let payload = match event.body {
            EventBody::ToolCallStart(body) => serde_json::to_value(body),
            EventBody::ToolCallOutput(body) => serde_json::to_value(body),
            EventBody::AssistantTextChunk(body) => serde_json::to_value(body),
            EventBody::FinalMessage(body) => serde_json::to_value(body),
        }
        .unwrap_or(Value::Null);

        RawEvent {
            event_type,
            session_id: event.session_id,
            timestamp: event.timestamp,
            payload,
        }
    }
}
