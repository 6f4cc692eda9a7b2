//! Tool call state machine.
//!
//! Tracks the lifecycle of one tool invocation requested by the model.
//!
//! # State Transitions
//!
//! ```text
//! Pending ──> InProgress ──> Completed
//!    │                  └──> Failed
//!    └──> Completed | Failed   (denied or cancelled before execution)
//! ```
//!
//! Transitions are strictly forward; terminal states accept nothing.

use crate::core::error::DomainError;
use crate::session::entities::SessionId;
use crate::tool::value_objects::{ToolContent, ToolError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallId(String);

impl ToolCallId {
    /// Generate a fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self(format!("call_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ToolCallStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Re-announcing `InProgress` is allowed so progress updates can carry
    /// the current status.
    pub fn can_transition_to(self, next: ToolCallStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() > self.rank() || (self == Self::InProgress && next == Self::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ToolCallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category of a tool, used by clients for icons and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Read,
    Edit,
    Delete,
    Move,
    Search,
    Execute,
    Think,
    Fetch,
    Other,
}

impl ToolKind {
    /// Infer a kind from a bare tool name.
    pub fn infer(tool_name: &str) -> Self {
        let name = tool_name.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| name.contains(w));
        if has(&["delete", "remove", "unlink", "rm_"]) {
            Self::Delete
        } else if has(&["move", "rename"]) {
            Self::Move
        } else if has(&["write", "edit", "update", "create", "patch", "replace"]) {
            Self::Edit
        } else if has(&["search", "grep", "find", "glob", "query"]) {
            Self::Search
        } else if has(&["fetch", "http", "download", "web", "url"]) {
            Self::Fetch
        } else if has(&["read", "get", "list", "cat", "show", "view"]) {
            Self::Read
        } else if has(&["run", "exec", "command", "shell", "bash"]) {
            Self::Execute
        } else if has(&["think", "plan", "reason"]) {
            Self::Think
        } else {
            Self::Other
        }
    }
}

/// A tracked tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub session_id: SessionId,
    /// Bare tool name on the owning server
    pub tool_name: String,
    pub server_name: String,
    pub arguments: Value,
    pub kind: ToolKind,
    pub title: String,
    pub status: ToolCallStatus,
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolCall {
    /// Create a new call in `Pending` state.
    pub fn new(
        session_id: SessionId,
        server_name: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Value,
    ) -> Self {
        let tool_name = tool_name.into();
        let server_name = server_name.into();
        Self {
            id: ToolCallId::generate(),
            session_id,
            kind: ToolKind::infer(&tool_name),
            title: format!("{server_name}: {tool_name}"),
            tool_name,
            server_name,
            arguments,
            status: ToolCallStatus::Pending,
            content: Vec::new(),
            error: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_kind(mut self, kind: ToolKind) -> Self {
        self.kind = kind;
        self
    }

    /// Move to `next`, rejecting backward or post-terminal transitions.
    pub fn transition(&mut self, next: ToolCallStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}
