//! Server domain entities

use crate::core::error::DomainError;
use crate::tool::naming::validate_server_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// How a server is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportSpec {
    /// Child process speaking newline-delimited JSON-RPC on stdin/stdout
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// Streamable HTTP endpoint (POST JSON-RPC, JSON or SSE replies)
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// TCP socket speaking newline-delimited JSON-RPC
    Tcp { address: String },
}

impl TransportSpec {
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Stdio { .. } => TransportKind::Stdio,
            Self::Http { .. } => TransportKind::Http,
            Self::Tcp { .. } => TransportKind::Tcp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Stdio,
    Http,
    Tcp,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Tcp => "tcp",
        })
    }
}

/// Whether one connection is kept across calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// One connection reused across calls
    #[default]
    Persistent,
    /// A connection opened and closed per call
    Ephemeral,
}

/// Configuration of one backend server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub transport: TransportSpec,
    pub persistence: PersistenceMode,
    /// Reconnect a lost persistent connection on the next call
    pub reconnect_on_disconnect: bool,
    /// Per-request timeout applied when the caller gives no deadline
    pub request_timeout: Option<Duration>,
    /// Only these tools are exposed when set
    pub allowed_tools: Option<Vec<String>>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, transport: TransportSpec) -> Self {
        Self {
            name: name.into(),
            transport,
            persistence: PersistenceMode::Persistent,
            reconnect_on_disconnect: true,
            request_timeout: None,
            allowed_tools: None,
        }
    }

    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self::new(
            name,
            TransportSpec::Stdio {
                command: command.into(),
                args,
                env: HashMap::new(),
            },
        )
    }

    pub fn with_persistence(mut self, persistence: PersistenceMode) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect_on_disconnect = reconnect;
        self
    }

    pub fn with_allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.allowed_tools = Some(tools);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Whether a tool passes the `allowed_tools` filter.
    pub fn allows_tool(&self, tool: &str) -> bool {
        self.allowed_tools
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|t| t == tool))
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_server_name(&self.name)
    }
}

/// Connection state of a server handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Last call failed transiently; reconnect pending
    Degraded,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Degraded => "degraded",
        })
    }
}

/// Opaque application-level session token issued by a server.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionCookie(String);

impl SessionCookie {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Cookies are credentials; keep them out of logs.
impl std::fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionCookie(<{} bytes>)", self.0.len())
    }
}

/// Observable state of one server, as held by the connection registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHandle {
    pub server_name: String,
    pub transport_kind: TransportKind,
    pub connection_state: ConnectionState,
    pub persistence_mode: PersistenceMode,
    #[serde(skip)]
    pub session_cookie: Option<SessionCookie>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_count: Option<usize>,
    /// Successful reconnects since the handle was created
    pub reconnects: u32,
    /// Whether a connection was ever established
    pub ever_connected: bool,
}

impl ServerHandle {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            server_name: config.name.clone(),
            transport_kind: config.transport.kind(),
            connection_state: ConnectionState::Disconnected,
            persistence_mode: config.persistence,
            session_cookie: None,
            last_error: None,
            tool_count: None,
            reconnects: 0,
            ever_connected: false,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session_cookie.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdio_config_defaults() {
        let config = ServerConfig::stdio("files", "mcp-files", vec!["--root".into(), ".".into()]);
        assert_eq!(config.persistence, PersistenceMode::Persistent);
        assert!(config.reconnect_on_disconnect);
        assert_eq!(config.transport.kind(), TransportKind::Stdio);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_allowed_tools_filter() {
        let open = ServerConfig::stdio("a", "x", vec![]);
        assert!(open.allows_tool("anything"));

        let filtered = open.with_allowed_tools(vec!["echo".into()]);
        assert!(filtered.allows_tool("echo"));
        assert!(!filtered.allows_tool("shout"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let config = ServerConfig::new("bad__name", TransportSpec::Tcp { address: "127.0.0.1:9".into() });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_handle_starts_disconnected() {
        let config = ServerConfig::stdio("a", "x", vec![]).with_persistence(PersistenceMode::Ephemeral);
        let handle = ServerHandle::new(&config);
        assert_eq!(handle.connection_state, ConnectionState::Disconnected);
        assert_eq!(handle.persistence_mode, PersistenceMode::Ephemeral);
        assert!(!handle.has_session());
        assert!(!handle.ever_connected);
    }

    #[test]
    fn test_cookie_debug_redacted() {
        let cookie = SessionCookie::new("secret-token");
        assert_eq!(format!("{cookie:?}"), "SessionCookie(<12 bytes>)");
    }

    #[test]
    fn test_transport_spec_deserializes_tagged() {
        let spec: TransportSpec =
            serde_json::from_str(r#"{"type":"http","url":"http://localhost:8080/mcp"}"#).unwrap();
        assert_eq!(spec.kind(), TransportKind::Http);
    }
}
