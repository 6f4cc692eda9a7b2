//! Tool domain value objects - immutable result and error types
//!
//! A [`ToolResult`] is what a server returned for one `tools/call`. A
//! [`ToolError`] is what the orchestrator reports when no result could be
//! obtained (unknown tool, denied, timed out, transport failure).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error attached to a failed tool call.
///
/// | Code | Meaning |
/// |------|---------|
/// | `NOT_FOUND` | No server exposes the requested name |
/// | `PERMISSION_DENIED` | Permission gate refused the call |
/// | `CANCELLED` | The driving session cancelled the call |
/// | `TIMEOUT` | The caller deadline expired |
/// | `CONNECTION` | Transport failure after reconnect attempts |
/// | `SESSION_TERMINATED` | Server session could not be re-established |
/// | `EXECUTION_FAILED` | The server reported an error |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    /// Error code (e.g., "NOT_FOUND", "PERMISSION_DENIED")
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", format!("Tool not found: {}", name.into()))
    }

    pub fn permission_denied(name: impl Into<String>) -> Self {
        Self::new(
            "PERMISSION_DENIED",
            format!("Permission denied: {}", name.into()),
        )
    }

    pub fn cancelled() -> Self {
        Self::new("CANCELLED", "Tool call cancelled")
    }

    pub fn timeout(name: impl Into<String>) -> Self {
        Self::new("TIMEOUT", format!("Tool call timed out: {}", name.into()))
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new("CONNECTION", message)
    }

    pub fn session_terminated(message: impl Into<String>) -> Self {
        Self::new("SESSION_TERMINATED", message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new("EXECUTION_FAILED", message)
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ToolError {}

/// One block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text { text: String },
    Json { value: Value },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Render the block as plain text.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Json { value } => value.to_string(),
        }
    }
}

/// Result of a `tools/call` round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    /// Server flagged the call as failed (`isError`)
    #[serde(default)]
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
}

impl ToolResult {
    /// Create a successful text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            ..Default::default()
        }
    }

    /// Parse the `result` object of a `tools/call` response.
    ///
    /// Text blocks are kept as text; every other block type is kept as raw
    /// JSON so no server output is lost.
    pub fn from_call_result(value: &Value) -> Self {
        let content = value
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .map(|block| match block.get("type").and_then(Value::as_str) {
                        Some("text") => ToolContent::text(
                            block.get("text").and_then(Value::as_str).unwrap_or_default(),
                        ),
                        _ => ToolContent::Json {
                            value: block.clone(),
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            content,
            is_error: value
                .get("isError")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            structured: value.get("structuredContent").cloned(),
        }
    }

    /// All blocks joined as text.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(ToolContent::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
