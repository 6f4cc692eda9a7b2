//! `ServerConnection` over any [`RpcChannel`].

use super::RpcChannel;
use super::protocol::{
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    initialize_params, parse_tools_page, session_id_from_initialize, tools_call_params,
    tools_list_params,
};
use async_trait::async_trait;
use conductor_application::{ServerConnection, ToolPage, TransportError};
use conductor_domain::{SessionCookie, ToolResult};
use serde_json::{Value, json};
use tracing::debug;

/// A handshaken connection to one tool server.
pub struct McpConnection {
    server_name: String,
    channel: Box<dyn RpcChannel>,
}

impl McpConnection {
    /// Run the `initialize` handshake on `channel`.
    ///
    /// A `cookie` is attached to the handshake so the server can resume
    /// that session; a session id in the result replaces it.
    pub async fn initialize(
        server_name: impl Into<String>,
        channel: Box<dyn RpcChannel>,
        cookie: Option<SessionCookie>,
        client_name: &str,
        client_version: &str,
    ) -> Result<Self, TransportError> {
        let server_name = server_name.into();
        channel.set_session_cookie(cookie);

        let result = channel
            .request(
                METHOD_INITIALIZE,
                initialize_params(client_name, client_version),
            )
            .await?;
        if let Some(cookie) = session_id_from_initialize(&result) {
            channel.set_session_cookie(Some(cookie));
        }
        channel.notify(METHOD_INITIALIZED, json!({})).await?;

        let server_info = result
            .get("serverInfo")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        debug!(
            server = %server_name,
            server_info = %server_info,
            has_session = channel.session_cookie().is_some(),
            "Server initialized"
        );
        Ok(Self {
            server_name,
            channel,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

#[async_trait]
impl ServerConnection for McpConnection {
    async fn list_tools(&self, cursor: Option<String>) -> Result<ToolPage, TransportError> {
        let result = self
            .channel
            .request(METHOD_TOOLS_LIST, tools_list_params(cursor))
            .await?;
        parse_tools_page(&self.server_name, &result)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, TransportError> {
        let result = self
            .channel
            .request(METHOD_TOOLS_CALL, tools_call_params(name, arguments))
            .await?;
        Ok(ToolResult::from_call_result(&result))
    }

    fn session_cookie(&self) -> Option<SessionCookie> {
        self.channel.session_cookie()
    }

    fn take_tool_list_changed(&self) -> bool {
        self.channel.take_tool_list_changed()
    }

    fn is_alive(&self) -> bool {
        self.channel.is_alive()
    }

    async fn close(&self) {
        self.channel.close().await;
    }
}
