//! Session identity and the explicit session context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one agent session
///
/// Hosts usually supply their own session ids; [`SessionId::generate`]
/// produces a UUIDv7-based id when they do not.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a host-supplied session id
    ///
    /// # Examples
    ///
    /// ```
    /// use attest_domain::SessionId;
    ///
    /// let id = SessionId::new("chat-42");
    /// assert_eq!(id.as_str(), "chat-42");
    /// ```
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh, chronologically sortable session id
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Explicit session scope passed to every pipeline stage
///
/// There is no process-wide "current session": whoever needs to know which
/// session they are working for receives this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    session_id: SessionId,
    started_at: DateTime<Utc>,
}

impl SessionContext {
    /// Open a context for the given session, starting now
    pub fn new(session_id: SessionId) -> Self {
        Self::started_at(session_id, Utc::now())
    }

    /// Open a context with an explicit start time (replays, tests)
    pub fn started_at(session_id: SessionId, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            started_at,
        }
    }

    /// The session this context belongs to
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// When the session was opened
    pub fn start_time(&self) -> DateTime<Utc> {
        self.started_at
    }
}
