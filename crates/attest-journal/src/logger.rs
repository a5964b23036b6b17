//! Append-only audit event logger

use crate::error::JournalError;
use crate::sink::AuditSink;
use attest_domain::{AuditEvent, AuditEventType, AuditLevel, SessionContext, SessionId};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::error;

/// Session-scoped audit logger
///
/// Records are written in call order; each payload is stamped with the
/// session id, a per-session sequence number and a severity level. The
/// logger keeps an in-memory mirror of every record it managed to write.
pub struct EventLogger {
    session_id: SessionId,
    sink: Box<dyn AuditSink>,
    events: Vec<AuditEvent>,
    next_seq: u64,
    halted: bool,
}

impl EventLogger {
    /// Create a logger for the session in `ctx`
    pub fn new(ctx: &SessionContext, sink: Box<dyn AuditSink>) -> Self {
        Self {
            session_id: ctx.session_id().clone(),
            sink,
            events: Vec::new(),
            next_seq: 1,
            halted: false,
        }
    }

    /// Record an event at its type's default level, timestamped now
    pub fn record(
        &mut self,
        event_type: AuditEventType,
        payload: Value,
    ) -> Result<&AuditEvent, JournalError> {
        self.record_at(event_type, event_type.default_level(), Utc::now(), payload)
    }

    /// Record an event at WARNING level
    pub fn warn(
        &mut self,
        event_type: AuditEventType,
        payload: Value,
    ) -> Result<&AuditEvent, JournalError> {
        self.record_at(event_type, AuditLevel::Warning, Utc::now(), payload)
    }

    /// Record an event with an explicit level and timestamp
    pub fn record_at(
        &mut self,
        event_type: AuditEventType,
        level: AuditLevel,
        timestamp: DateTime<Utc>,
        payload: Value,
    ) -> Result<&AuditEvent, JournalError> {
        if self.halted {
            return Err(JournalError::Halted);
        }

        let mut fields = match payload {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => {
                let mut fields = Map::new();
                fields.insert("detail".to_string(), other);
                fields
            }
        };
        fields.insert("session_id".to_string(), Value::String(self.session_id.to_string()));
        fields.insert("seq".to_string(), Value::from(self.next_seq));
        fields.insert("level".to_string(), serde_json::to_value(level)?);

        let event = AuditEvent::new(event_type, timestamp, Value::Object(fields));
        let line = event.to_json_line()?;

        if let Err(e) = self.sink.append_line(&line) {
            error!(
                "Audit write failed for session {} at seq {}: {}",
                self.session_id, self.next_seq, e
            );
            self.halted = true;
            return Err(JournalError::LogWrite(e));
        }

        self.next_seq += 1;
        self.events.push(event);
        let index = self.events.len() - 1;
        Ok(&self.events[index])
    }

    /// Flush the sink
    pub fn flush(&mut self) -> Result<(), JournalError> {
        if self.halted {
            return Err(JournalError::Halted);
        }
        self.sink.flush().map_err(|e| {
            self.halted = true;
            JournalError::LogWrite(e)
        })
    }

    /// Every record written so far, in order
    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    /// Records of one type, in order
    pub fn events_of(&self, event_type: AuditEventType) -> impl Iterator<Item = &AuditEvent> {
        self.events.iter().filter(move |event| event.event_type == event_type)
    }

    /// Whether a write failure has halted the logger
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Session this logger writes for
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Hand the in-memory trail over at session end
    pub fn into_events(self) -> Vec<AuditEvent> {
        self.events
    }
}
