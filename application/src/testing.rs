//! Scriptable in-process transport and recording ports for unit tests.

use crate::ports::permission_arbiter::{ArbiterError, PermissionArbiter, PermissionRequest};
use crate::ports::session_update::{SessionUpdateSink, ToolCallUpdate};
use crate::ports::transport::{ServerConnection, ToolPage, TransportConnector, TransportError};
use async_trait::async_trait;
use conductor_domain::{
    PermissionOutcome, ServerConfig, SessionCookie, ToolCallStatus, ToolDescriptor, ToolResult,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Behaviour of one fake server.
pub(crate) struct MockServer {
    pub name: String,
    pub tools: Mutex<Vec<String>>,
    pub page_size: usize,
    pub call_failures: Mutex<VecDeque<TransportError>>,
    pub connect_failures: Mutex<VecDeque<TransportError>>,
    pub call_delay: Mutex<Option<Duration>>,
    pub connect_delay: Mutex<Option<Duration>>,
    pub connects: AtomicUsize,
    pub calls: AtomicUsize,
    pub list_requests: AtomicUsize,
    pub cookies_seen: Mutex<Vec<Option<String>>>,
    next_session: AtomicUsize,
    live: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockServer {
    pub fn new(name: &str, tools: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            tools: Mutex::new(tools.iter().map(|t| t.to_string()).collect()),
            page_size: 2,
            call_failures: Mutex::new(VecDeque::new()),
            connect_failures: Mutex::new(VecDeque::new()),
            call_delay: Mutex::new(None),
            connect_delay: Mutex::new(None),
            connects: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            list_requests: AtomicUsize::new(0),
            cookies_seen: Mutex::new(Vec::new()),
            next_session: AtomicUsize::new(1),
            live: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_next_call(&self, error: TransportError) {
        self.call_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_next_connect(&self, error: TransportError) {
        self.connect_failures.lock().unwrap().push_back(error);
    }

    pub fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = Some(delay);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cookies_seen(&self) -> Vec<Option<String>> {
        self.cookies_seen.lock().unwrap().clone()
    }

    /// Drop every open connection, as if the process died.
    pub fn kill_connections(&self) {
        for conn in self.live.lock().unwrap().drain(..) {
            conn.alive.store(false, Ordering::SeqCst);
        }
    }

    /// Announce a tool list change on every open connection.
    pub fn announce_list_changed(&self) {
        for conn in self.live.lock().unwrap().iter() {
            conn.list_changed.store(true, Ordering::SeqCst);
        }
    }
}

pub(crate) struct MockConnection {
    server: Arc<MockServer>,
    cookie: SessionCookie,
    alive: AtomicBool,
    list_changed: AtomicBool,
}

#[async_trait]
impl ServerConnection for MockConnection {
    async fn list_tools(&self, cursor: Option<String>) -> Result<ToolPage, TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.server.list_requests.fetch_add(1, Ordering::SeqCst);
        let tools = self.server.tools.lock().unwrap().clone();
        let start: usize = cursor.as_deref().map_or(0, |c| c.parse().unwrap());
        let end = (start + self.server.page_size).min(tools.len());
        Ok(ToolPage {
            tools: tools[start..end]
                .iter()
                .map(|t| ToolDescriptor::new(&self.server.name, t))
                .collect(),
            next_cursor: (end < tools.len()).then(|| end.to_string()),
        })
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.server.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.server.call_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.server.call_failures.lock().unwrap().pop_front() {
            if matches!(error, TransportError::Closed | TransportError::Io(_)) {
                self.alive.store(false, Ordering::SeqCst);
            }
            return Err(error);
        }
        Ok(ToolResult::text(format!(
            "{}/{}: {}",
            self.server.name, name, arguments
        )))
    }

    fn session_cookie(&self) -> Option<SessionCookie> {
        Some(self.cookie.clone())
    }

    fn take_tool_list_changed(&self) -> bool {
        self.list_changed.swap(false, Ordering::SeqCst)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

/// Connector over a fixed set of fake servers.
pub(crate) struct MockConnector {
    servers: HashMap<String, Arc<MockServer>>,
}

impl MockConnector {
    pub fn new(servers: Vec<Arc<MockServer>>) -> Arc<Self> {
        Arc::new(Self {
            servers: servers.into_iter().map(|s| (s.name.clone(), s)).collect(),
        })
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(
        &self,
        config: &ServerConfig,
        cookie: Option<SessionCookie>,
    ) -> Result<Arc<dyn ServerConnection>, TransportError> {
        let server = self
            .servers
            .get(&config.name)
            .cloned()
            .ok_or_else(|| TransportError::Spawn(format!("no such server {}", config.name)))?;
        let delay = *server.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        server.connects.fetch_add(1, Ordering::SeqCst);
        server
            .cookies_seen
            .lock()
            .unwrap()
            .push(cookie.as_ref().map(|c| c.as_str().to_string()));
        if let Some(error) = server.connect_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let cookie = cookie.unwrap_or_else(|| {
            let n = server.next_session.fetch_add(1, Ordering::SeqCst);
            SessionCookie::new(format!("session-{n}"))
        });
        let conn = Arc::new(MockConnection {
            server: server.clone(),
            cookie,
            alive: AtomicBool::new(true),
            list_changed: AtomicBool::new(false),
        });
        server.live.lock().unwrap().push(conn.clone());
        Ok(conn)
    }
}

/// Records every notification.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub updates: Mutex<Vec<ToolCallUpdate>>,
}

impl RecordingSink {
    pub fn statuses(&self) -> Vec<ToolCallStatus> {
        self.updates.lock().unwrap().iter().map(|u| u.status).collect()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl SessionUpdateSink for RecordingSink {
    fn notify(&self, update: ToolCallUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

/// Arbiter answering from a script, counting prompts.
pub(crate) struct ScriptedArbiter {
    answers: Mutex<VecDeque<Result<PermissionOutcome, ArbiterError>>>,
    pub prompts: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedArbiter {
    pub fn new(answers: Vec<Result<PermissionOutcome, ArbiterError>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            prompts: AtomicUsize::new(0),
            delay: None,
        })
    }

    pub fn slow(answers: Vec<Result<PermissionOutcome, ArbiterError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            prompts: AtomicUsize::new(0),
            delay: Some(delay),
        })
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionArbiter for ScriptedArbiter {
    async fn request_permission(
        &self,
        _request: PermissionRequest,
    ) -> Result<PermissionOutcome, ArbiterError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ArbiterError::Unavailable("script exhausted".into())))
    }
}
