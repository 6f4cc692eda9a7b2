//! Tool-server transports
//!
//! Every transport is reduced to an [`RpcChannel`]; [`McpConnection`]
//! implements the application's `ServerConnection` port on top of any
//! channel, and [`McpConnector`] performs the handshake.
//!
//! | Transport | Framing | Session cookie |
//! |-----------|---------|----------------|
//! | stdio | newline-delimited JSON-RPC | `params._meta.sessionId` |
//! | TCP | newline-delimited JSON-RPC | `params._meta.sessionId` |
//! | HTTP (`http` feature) | POST + JSON or SSE | `Mcp-Session-Id` header |

mod client;
mod connector;
#[cfg(feature = "http")]
pub mod http;
pub mod line;
pub mod protocol;
pub mod stdio;
pub mod tcp;

pub use client::McpConnection;
pub use connector::McpConnector;

use async_trait::async_trait;
use conductor_application::TransportError;
use conductor_domain::SessionCookie;
use serde_json::Value;

/// A bidirectional JSON-RPC channel to one server.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Send a request and wait for its result.
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// Send a notification (no response expected).
    async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError>;

    fn session_cookie(&self) -> Option<SessionCookie>;

    fn set_session_cookie(&self, cookie: Option<SessionCookie>);

    /// Whether a `tools/list_changed` notification arrived. Clears the flag.
    fn take_tool_list_changed(&self) -> bool;

    fn is_alive(&self) -> bool;

    async fn close(&self);
}
