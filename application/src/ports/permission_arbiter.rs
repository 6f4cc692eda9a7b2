//! Permission arbiter port.
//!
//! The arbiter is whoever answers "may this tool run?" when no remembered
//! decision exists: the driving client, a console prompt, or a fixed
//! policy.
//!
//! # Built-in Implementations
//!
//! - [`AutoApproveArbiter`] - Always selects "allow once"
//! - [`AutoRejectArbiter`] - Always selects "reject once"
//!
//! For interactive use, see `ConsolePermissionArbiter` in the presentation layer.

use async_trait::async_trait;
use conductor_domain::{PermissionOption, PermissionOutcome, SessionId, ToolCallId, ToolKind};
use serde_json::Value;
use thiserror::Error;

/// What the arbiter is asked to decide.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionRequest {
    pub session_id: SessionId,
    pub tool_call_id: ToolCallId,
    pub server_name: String,
    pub tool_name: String,
    pub title: String,
    pub kind: ToolKind,
    pub arguments: Value,
    pub options: Vec<PermissionOption>,
}

/// Failures while asking; every one of them denies the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArbiterError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),

    #[error("Arbiter unavailable: {0}")]
    Unavailable(String),
}

/// Answers permission requests.
#[async_trait]
pub trait PermissionArbiter: Send + Sync {
    /// Ask for a decision.
    ///
    /// Returning `PermissionOutcome::Cancelled` means the request was
    /// withdrawn; the call is denied and nothing is remembered.
    async fn request_permission(
        &self,
        request: PermissionRequest,
    ) -> Result<PermissionOutcome, ArbiterError>;
}

/// Allows every call once without remembering it.
pub struct AutoApproveArbiter;

#[async_trait]
impl PermissionArbiter for AutoApproveArbiter {
    async fn request_permission(
        &self,
        _request: PermissionRequest,
    ) -> Result<PermissionOutcome, ArbiterError> {
        Ok(PermissionOutcome::Selected(PermissionOption::AllowOnce))
    }
}

/// Rejects every call once without remembering it.
///
/// The safest non-interactive choice.
pub struct AutoRejectArbiter;

#[async_trait]
impl PermissionArbiter for AutoRejectArbiter {
    async fn request_permission(
        &self,
        _request: PermissionRequest,
    ) -> Result<PermissionOutcome, ArbiterError> {
        Ok(PermissionOutcome::Selected(PermissionOption::RejectOnce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PermissionRequest {
        PermissionRequest {
            session_id: SessionId::new("s1"),
            tool_call_id: ToolCallId::new("call_1"),
            server_name: "A".into(),
            tool_name: "echo".into(),
            title: "A: echo".into(),
            kind: ToolKind::Other,
            arguments: serde_json::json!({}),
            options: PermissionOption::ALL.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_auto_approve() {
        let outcome = AutoApproveArbiter.request_permission(request()).await.unwrap();
        assert!(outcome.allows());
        assert_eq!(outcome.remembered(), None);
    }

    #[tokio::test]
    async fn test_auto_reject() {
        let outcome = AutoRejectArbiter.request_permission(request()).await.unwrap();
        assert!(!outcome.allows());
        assert_eq!(outcome.remembered(), None);
    }
}
