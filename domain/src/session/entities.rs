//! Session domain entities

use serde::{Deserialize, Serialize};

/// Identifier of a conversation session, chosen by the driving client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// An operating mode a session can be switched into (e.g. "ask", "code").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMode {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SessionMode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }
}

/// A conversation driven by a client (Entity)
///
/// At most one generation is active at a time. `generation_epoch`
/// increases with every accepted generation so a stale lease can tell it
/// no longer owns the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: SessionId,
    pub active_generation: bool,
    pub generation_epoch: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_mode_id: Option<String>,
    #[serde(default)]
    pub available_modes: Vec<SessionMode>,
}

impl ConversationSession {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            active_generation: false,
            generation_epoch: 0,
            current_mode_id: None,
            available_modes: Vec::new(),
        }
    }

    /// Attach modes; the first becomes current.
    pub fn with_modes(mut self, modes: Vec<SessionMode>) -> Self {
        self.current_mode_id = modes.first().map(|m| m.id.clone());
        self.available_modes = modes;
        self
    }

    pub fn supports_mode(&self, mode_id: &str) -> bool {
        self.available_modes.iter().any(|m| m.id == mode_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let session = ConversationSession::new(SessionId::new("s1"));
        assert!(!session.active_generation);
        assert_eq!(session.generation_epoch, 0);
        assert!(session.current_mode_id.is_none());
    }

    #[test]
    fn test_with_modes_selects_first() {
        let session = ConversationSession::new("s1".into()).with_modes(vec![
            SessionMode::new("ask", "Ask"),
            SessionMode::new("code", "Code"),
        ]);
        assert_eq!(session.current_mode_id.as_deref(), Some("ask"));
        assert!(session.supports_mode("code"));
        assert!(!session.supports_mode("architect"));
    }
}
