//! Transport port
//!
//! Defines how the connection registry talks to a backend tool server.
//! Adapters (stdio, TCP, HTTP) live in the infrastructure layer and
//! perform the protocol handshake inside [`TransportConnector::connect`].

use async_trait::async_trait;
use conductor_domain::{ServerConfig, ServerErrorPayload, SessionCookie, ToolDescriptor, ToolResult};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a transport adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to start server: {0}")]
    Spawn(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Transport closed")]
    Closed,

    #[error("Request timed out")]
    Timeout,

    #[error("Server error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unsupported transport: {0}")]
    Unsupported(String),
}

impl TransportError {
    /// Reduce to the payload consumed by error classification.
    pub fn payload(&self, had_cookie: bool) -> ServerErrorPayload {
        let payload = match self {
            Self::Spawn(msg) | Self::Io(msg) => ServerErrorPayload::transport(msg.clone()),
            Self::Closed => ServerErrorPayload::transport("transport closed"),
            Self::Timeout => ServerErrorPayload::transport("request timed out"),
            Self::Rpc { code, message } => ServerErrorPayload::rpc(*code, message.clone()),
            Self::Http { status, message } => ServerErrorPayload::http(*status, message.clone()),
            Self::Protocol(msg) | Self::Unsupported(msg) => ServerErrorPayload {
                message: msg.clone(),
                ..Default::default()
            },
        };
        payload.with_cookie(had_cookie)
    }
}

/// One page of a `tools/list` response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolPage {
    pub tools: Vec<ToolDescriptor>,
    pub next_cursor: Option<String>,
}

/// A live connection to one server, already past the handshake.
#[async_trait]
pub trait ServerConnection: Send + Sync {
    /// Fetch one page of the server's tool list.
    async fn list_tools(&self, cursor: Option<String>) -> Result<ToolPage, TransportError>;

    /// Invoke a tool by its bare name.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, TransportError>;

    /// Session cookie currently attached to requests, if any.
    fn session_cookie(&self) -> Option<SessionCookie>;

    /// Whether the server announced a tool list change since the last call.
    ///
    /// Reading clears the flag.
    fn take_tool_list_changed(&self) -> bool;

    /// Whether the underlying stream is still usable.
    fn is_alive(&self) -> bool;

    /// Close the connection. Idempotent.
    async fn close(&self);
}

/// Opens connections to servers.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open a connection and complete the handshake.
    ///
    /// A `cookie` asks the server to resume that session; `None` starts a
    /// fresh one.
    async fn connect(
        &self,
        config: &ServerConfig,
        cookie: Option<SessionCookie>,
    ) -> Result<Arc<dyn ServerConnection>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::{ErrorClass, classify_server_error};

    #[test]
    fn test_payload_classification() {
        assert_eq!(
            classify_server_error(&TransportError::Closed.payload(false)),
            ErrorClass::Transient
        );
        assert_eq!(
            classify_server_error(&TransportError::Timeout.payload(true)),
            ErrorClass::Transient
        );
        assert_eq!(
            classify_server_error(
                &TransportError::Http {
                    status: 404,
                    message: "Not Found".into()
                }
                .payload(true)
            ),
            ErrorClass::Fatal
        );
        assert_eq!(
            classify_server_error(
                &TransportError::Rpc {
                    code: -32602,
                    message: "Invalid params".into()
                }
                .payload(false)
            ),
            ErrorClass::Other
        );
        assert_eq!(
            classify_server_error(&TransportError::Protocol("bad frame".into()).payload(false)),
            ErrorClass::Other
        );
    }
}
