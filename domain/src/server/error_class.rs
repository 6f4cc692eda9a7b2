//! Classification of server and transport failures.
//!
//! Every failure observed while talking to a server is reduced to a
//! [`ServerErrorPayload`] and classified exactly once:
//!
//! | Class | Examples | Registry reaction |
//! |-------|----------|-------------------|
//! | [`ErrorClass::Fatal`] | session terminated, session required, 404 with a cookie | drop cookie, open a fresh session |
//! | [`ErrorClass::Transient`] | broken pipe, refused, reset, timeout, 502/503/504 | reconnect with bounded attempts |
//! | [`ErrorClass::Other`] | invalid params, tool-level errors | surface unchanged |

use serde::{Deserialize, Serialize};

/// JSON-RPC error code a server uses when the client's session is gone.
pub const SESSION_TERMINATED_CODE: i64 = -32040;

/// JSON-RPC error code a server uses when a request carries no session.
pub const SESSION_REQUIRED_CODE: i64 = -32041;

/// Message fragments that indicate server-side session loss.
const SESSION_LOSS_PHRASES: &[&str] = &[
    "session expired",
    "session terminated",
    "session not found",
    "unknown session",
    "invalid session",
    "session required",
    "no valid session",
];

/// Message fragments that indicate a broken or unreachable transport.
const TRANSIENT_PHRASES: &[&str] = &[
    "broken pipe",
    "connection refused",
    "connection reset",
    "connection closed",
    "connection aborted",
    "timed out",
    "timeout",
    "unexpected eof",
    "transport closed",
];

/// Everything known about one failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerErrorPayload {
    /// JSON-RPC error code, when the server answered with an error object
    pub rpc_code: Option<i64>,
    /// HTTP status, for HTTP transports
    pub http_status: Option<u16>,
    pub message: String,
    /// Failure happened below the protocol (I/O, closed stream, deadline)
    pub transport_failure: bool,
    /// The request carried a session cookie
    pub had_cookie: bool,
}

impl ServerErrorPayload {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self {
            rpc_code: Some(code),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            http_status: Some(status),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transport_failure: true,
            ..Default::default()
        }
    }

    pub fn with_cookie(mut self, had_cookie: bool) -> Self {
        self.had_cookie = had_cookie;
        self
    }
}

/// Classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Server-side session is gone; never retry on the same session
    Fatal,
    /// Connection-level failure; retry after reconnecting
    Transient,
    /// Anything else; surface to the caller
    Other,
}

/// Classify a failure.
pub fn classify_server_error(payload: &ServerErrorPayload) -> ErrorClass {
    if matches!(
        payload.rpc_code,
        Some(SESSION_TERMINATED_CODE | SESSION_REQUIRED_CODE)
    ) {
        return ErrorClass::Fatal;
    }
    if payload.http_status == Some(404) && payload.had_cookie {
        return ErrorClass::Fatal;
    }

    let message = payload.message.to_lowercase();
    if SESSION_LOSS_PHRASES.iter().any(|p| message.contains(p)) {
        return ErrorClass::Fatal;
    }

    if payload.transport_failure {
        return ErrorClass::Transient;
    }
    if matches!(payload.http_status, Some(408 | 429 | 502 | 503 | 504)) {
        return ErrorClass::Transient;
    }
    if payload.rpc_code.is_none() && TRANSIENT_PHRASES.iter().any(|p| message.contains(p)) {
        return ErrorClass::Transient;
    }

    ErrorClass::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_terminated_code_is_fatal() {
        let payload = ServerErrorPayload::rpc(-32040, "Session terminated by server");
        assert_eq!(classify_server_error(&payload), ErrorClass::Fatal);
    }

    #[test]
    fn test_session_required_code_is_fatal() {
        let payload = ServerErrorPayload::rpc(-32041, "Bad Request");
        assert_eq!(classify_server_error(&payload), ErrorClass::Fatal);
    }

    #[test]
    fn test_http_404_with_cookie_is_fatal() {
        let payload = ServerErrorPayload::http(404, "Not Found").with_cookie(true);
        assert_eq!(classify_server_error(&payload), ErrorClass::Fatal);
    }

    #[test]
    fn test_http_404_without_cookie_is_other() {
        let payload = ServerErrorPayload::http(404, "Not Found");
        assert_eq!(classify_server_error(&payload), ErrorClass::Other);
    }

    #[test]
    fn test_expiry_message_is_fatal_regardless_of_code() {
        let payload = ServerErrorPayload::rpc(-32603, "Internal error: Session expired, please reinitialize");
        assert_eq!(classify_server_error(&payload), ErrorClass::Fatal);

        let payload = ServerErrorPayload::http(400, "Bad Request: No valid session ID provided");
        assert_eq!(classify_server_error(&payload), ErrorClass::Fatal);
    }

    #[test]
    fn test_io_failures_are_transient() {
        for message in [
            "Broken pipe (os error 32)",
            "Connection refused (os error 111)",
            "server closed stdout",
        ] {
            let payload = ServerErrorPayload::transport(message);
            assert_eq!(classify_server_error(&payload), ErrorClass::Transient, "{message}");
        }
    }

    #[test]
    fn test_gateway_statuses_are_transient() {
        for status in [502, 503, 504] {
            let payload = ServerErrorPayload::http(status, "upstream unavailable");
            assert_eq!(classify_server_error(&payload), ErrorClass::Transient);
        }
    }

    #[test]
    fn test_timeout_text_without_code_is_transient() {
        let payload = ServerErrorPayload {
            message: "request timed out after 30s".into(),
            ..Default::default()
        };
        assert_eq!(classify_server_error(&payload), ErrorClass::Transient);
    }

    #[test]
    fn test_protocol_errors_are_other() {
        let payload = ServerErrorPayload::rpc(-32602, "Invalid params: missing 'text'");
        assert_eq!(classify_server_error(&payload), ErrorClass::Other);

        // A server-side error mentioning a timeout stays a server error
        let payload = ServerErrorPayload::rpc(-32603, "upstream API timeout");
        assert_eq!(classify_server_error(&payload), ErrorClass::Other);
    }
}
