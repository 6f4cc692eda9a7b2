//! Streamable HTTP transport.
//!
//! Every JSON-RPC message is POSTed to the server URL. The server answers
//! with either a JSON body or an SSE stream that eventually carries the
//! response. The session cookie travels in the `Mcp-Session-Id` header in
//! both directions.

use super::RpcChannel;
use super::protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, METHOD_INITIALIZE,
    METHOD_TOOLS_LIST_CHANGED, MessageKind, classify_message,
};
use async_trait::async_trait;
use conductor_application::TransportError;
use conductor_domain::SessionCookie;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, trace};

pub const SESSION_HEADER: &str = "Mcp-Session-Id";
pub const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
const ACCEPT: &str = "application/json, text/event-stream";

/// A JSON-RPC channel over streamable HTTP.
pub struct HttpChannel {
    server_name: String,
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
    cookie: RwLock<Option<SessionCookie>>,
    protocol_version: RwLock<Option<String>>,
    alive: AtomicBool,
    list_changed: AtomicBool,
}

impl HttpChannel {
    pub fn new(
        server_name: impl Into<String>,
        client: reqwest::Client,
        url: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            client,
            url: url.into(),
            headers,
            cookie: RwLock::new(None),
            protocol_version: RwLock::new(None),
            alive: AtomicBool::new(true),
            list_changed: AtomicBool::new(false),
        }
    }

    fn cookie(&self) -> Option<SessionCookie> {
        self.cookie
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn post<T: Serialize>(&self, message: &T) -> Result<reqwest::Response, TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, ACCEPT);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        if let Some(cookie) = self.cookie() {
            request = request.header(SESSION_HEADER, cookie.as_str());
        }
        let version = self
            .protocol_version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(version) = version {
            request = request.header(PROTOCOL_VERSION_HEADER, version);
        }

        let response = request.json(message).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Io(e.to_string())
            }
        })?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            self.set_session_cookie(Some(SessionCookie::new(session)));
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.trim().to_string()
            };
            return Err(TransportError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Read an SSE response until the message answering `id` arrives.
    async fn read_event_stream(
        &self,
        response: reqwest::Response,
        id: u64,
    ) -> Result<JsonRpcResponse, TransportError> {
        let mut stream = response.bytes_stream();
        let mut buffer = SseLineBuffer::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::Io(e.to_string()))?;
            for line in buffer.push(&chunk) {
                if let Some(response) = self.handle_sse_line(&line, id)? {
                    return Ok(response);
                }
            }
        }
        for line in buffer.finish() {
            if let Some(response) = self.handle_sse_line(&line, id)? {
                return Ok(response);
            }
        }
        Err(TransportError::Protocol(
            "event stream ended without a response".into(),
        ))
    }

    fn handle_sse_line(
        &self,
        line: &str,
        id: u64,
    ) -> Result<Option<JsonRpcResponse>, TransportError> {
        let Some(payload) = sse_data_payload(line).filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        trace!("HTTP channel event: {}", payload);
        let message: Value =
            serde_json::from_str(payload).map_err(|e| TransportError::Protocol(e.to_string()))?;

        match classify_message(&message) {
            MessageKind::Response => {
                let response: JsonRpcResponse = serde_json::from_value(message)
                    .map_err(|e| TransportError::Protocol(e.to_string()))?;
                Ok((response.id == Some(id)).then_some(response))
            }
            MessageKind::Notification => {
                if message.get("method").and_then(Value::as_str) == Some(METHOD_TOOLS_LIST_CHANGED)
                {
                    debug!(server = %self.server_name, "Tool list changed");
                    self.list_changed.store(true, Ordering::SeqCst);
                }
                Ok(None)
            }
            MessageKind::IncomingRequest => Ok(None),
        }
    }
}

#[async_trait]
impl RpcChannel for HttpChannel {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let request = JsonRpcRequest::new(method, Some(params));
        let response = self.post(&request).await?;

        let is_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_event_stream_content_type);
        let response = if is_stream {
            self.read_event_stream(response, request.id).await?
        } else {
            response
                .json::<JsonRpcResponse>()
                .await
                .map_err(|e| TransportError::Protocol(e.to_string()))?
        };

        let result = response.into_result()?;
        if method == METHOD_INITIALIZE
            && let Some(version) = result.get("protocolVersion").and_then(Value::as_str)
        {
            *self
                .protocol_version
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(version.to_string());
        }
        Ok(result)
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        self.post(&JsonRpcNotification::new(method, Some(params)))
            .await
            .map(|_| ())
    }

    fn session_cookie(&self) -> Option<SessionCookie> {
        self.cookie()
    }

    fn set_session_cookie(&self, cookie: Option<SessionCookie>) {
        *self.cookie.write().unwrap_or_else(PoisonError::into_inner) = cookie;
    }

    fn take_tool_list_changed(&self) -> bool {
        self.list_changed.swap(false, Ordering::SeqCst)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        // The server-side session is kept so a later connect can resume it
        self.alive.store(false, Ordering::SeqCst);
    }
}

/// Splits a byte stream into trimmed, non-empty lines.
#[derive(Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        split_lines(&complete)
    }

    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.pending);
        split_lines(&rest)
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

pub fn sse_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}
