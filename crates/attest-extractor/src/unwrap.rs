//! Peel transport envelopes off raw tool outputs
//!
//! Hosts and tool protocols wrap tool results in any number of layers: a
//! JSON document serialized into a string, MCP-style `content` blocks, or a
//! `{"result": ...}` style wrapper. [`unwrap_output`] removes one layer at a
//! time until a structured payload (object or array) remains.

use serde_json::{Map, Value};
use thiserror::Error;

/// Default bound on the number of envelopes peeled
pub const DEFAULT_MAX_UNWRAP_DEPTH: usize = 5;

/// Keys accepted as single-key transport wrappers
const WRAPPER_KEYS: &[&str] = &["result", "output", "data", "text", "response"];

/// Envelope metadata ignored when looking for a wrapper key
const METADATA_KEYS: &[&str] = &["type", "status", "is_error", "isError"];

/// Keys a protocol content block may carry
const CONTENT_BLOCK_KEYS: &[&str] = &[
    "type", "text", "data", "mimeType", "annotations", "resource", "uri", "name",
];

/// Why no structured payload could be recovered
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnwrapError {
    /// More envelopes than the configured bound
    #[error("Exceeded maximum unwrap depth of {max_depth}")]
    DepthExceeded {
        /// Configured bound
        max_depth: usize,
    },

    /// A scalar or non-JSON text where structure was expected
    #[error("Output is not structured: found {found}")]
    NotStructured {
        /// What was found instead
        found: &'static str,
    },

    /// An envelope with nothing inside
    #[error("Empty {envelope} envelope")]
    EmptyEnvelope {
        /// Kind of envelope
        envelope: &'static str,
    },
}

/// A recovered payload
#[derive(Debug, Clone, PartialEq)]
pub struct Unwrapped {
    /// Innermost object or array
    pub payload: Value,
    /// Number of envelopes removed
    pub layers: usize,
}

enum Peel {
    Done,
    Inner(Value),
}

/// Remove transport envelopes until a structured payload remains
///
/// # Examples
///
/// ```
/// use attest_extractor::unwrap_output;
/// use serde_json::json;
///
/// let raw = json!({"content": [{"type": "text", "text": "{\"valid\": true}"}]});
/// let unwrapped = unwrap_output(&raw, 5).unwrap();
/// assert_eq!(unwrapped.payload, json!({"valid": true}));
/// assert_eq!(unwrapped.layers, 2);
/// ```
pub fn unwrap_output(raw: &Value, max_depth: usize) -> Result<Unwrapped, UnwrapError> {
    let mut current = raw.clone();
    let mut layers = 0;

    loop {
        match peel(&current)? {
            Peel::Done => {
                return Ok(Unwrapped {
                    payload: current,
                    layers,
                })
            }
            Peel::Inner(inner) => {
                layers += 1;
                if layers > max_depth {
                    return Err(UnwrapError::DepthExceeded { max_depth });
                }
                current = inner;
            }
        }
    }
}

fn peel(value: &Value) -> Result<Peel, UnwrapError> {
    match value {
        Value::Null => Err(UnwrapError::NotStructured { found: "null" }),
        Value::Bool(_) => Err(UnwrapError::NotStructured { found: "boolean" }),
        Value::Number(_) => Err(UnwrapError::NotStructured { found: "number" }),
        Value::String(text) => parse_text(text).map(Peel::Inner),
        Value::Array(items) => {
            if !items.is_empty() && items.iter().all(is_content_block) {
                first_text_block(items).map(Peel::Inner)
            } else {
                Ok(Peel::Done)
            }
        }
        Value::Object(fields) => peel_object(fields),
    }
}

fn peel_object(fields: &Map<String, Value>) -> Result<Peel, UnwrapError> {
    if let Some(Value::Array(blocks)) = fields.get("content") {
        if blocks.iter().all(is_content_block) {
            if blocks.is_empty() {
                return Err(UnwrapError::EmptyEnvelope { envelope: "content" });
            }
            return first_text_block(blocks).map(Peel::Inner);
        }
    }

    let mut payload_keys = fields
        .keys()
        .filter(|key| !METADATA_KEYS.contains(&key.as_str()));
    if let (Some(only), None) = (payload_keys.next(), payload_keys.next()) {
        if WRAPPER_KEYS.contains(&only.as_str()) {
            return match &fields[only] {
                Value::Null => Err(UnwrapError::EmptyEnvelope { envelope: "wrapper" }),
                inner => Ok(Peel::Inner(inner.clone())),
            };
        }
    }

    Ok(Peel::Done)
}

fn is_content_block(block: &Value) -> bool {
    block.as_object().is_some_and(|fields| {
        fields.get("type").is_some_and(Value::is_string)
            && fields
                .keys()
                .all(|key| CONTENT_BLOCK_KEYS.contains(&key.as_str()))
    })
}

/// Text of the first `text` block whose content parses as JSON, falling
/// back to the first `text` block at all
fn first_text_block(blocks: &[Value]) -> Result<Value, UnwrapError> {
    let texts: Vec<&str> = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();

    let parseable = texts
        .iter()
        .find(|text| serde_json::from_str::<Value>(strip_code_fence(text)).is_ok());
    match parseable.or(texts.first()) {
        Some(text) => Ok(Value::String((*text).to_string())),
        None => Err(UnwrapError::EmptyEnvelope { envelope: "content" }),
    }
}

fn parse_text(text: &str) -> Result<Value, UnwrapError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(UnwrapError::EmptyEnvelope { envelope: "text" });
    }
    serde_json::from_str(body).map_err(|_| UnwrapError::NotStructured { found: "text" })
}

/// Strip a surrounding markdown code fence, if any
///
/// Models and some tools wrap JSON in ```` ```json ```` blocks.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    // Drop the opening fence line (```json or ```) and the closing fence
    let body = match trimmed.find('\n') {
        Some(newline) => &trimmed[newline + 1..],
        None => return "",
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
