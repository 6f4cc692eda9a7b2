//! Connection Registry
//!
//! The [`ConnectionRegistry`] owns one slot per configured server: its
//! config, the observable [`ServerHandle`], the live connection (for
//! persistent servers) and the cached tool list.
//!
//! # Failure handling
//!
//! Every failed attempt is classified with [`classify_server_error`]:
//!
//! - **Fatal** (server-side session gone): the cookie is dropped, the
//!   handle goes `Disconnected`, and the same call is retried once on a
//!   fresh session. A second fatal error is surfaced as
//!   [`RegistryError::SessionTerminated`].
//! - **Transient** (I/O, closed stream, refused): the handle goes
//!   `Degraded` and the call is retried after a backoff, reconnecting with
//!   the retained cookie, up to [`ReconnectPolicy::max_attempts`] times.
//! - **Other**: surfaced unchanged.
//!
//! # Concurrency
//!
//! Connecting is serialized per server by an async mutex: a caller that
//! loses the race reuses the winner's connection. Calls themselves run
//! concurrently on the shared connection. [`ConnectionRegistry::status`]
//! reads a snapshot and never waits for a connect in progress.

use crate::config::ReconnectPolicy;
use crate::ports::transport::{ServerConnection, TransportConnector, TransportError};
use conductor_domain::{
    ConnectionState, DomainError, ErrorClass, PersistenceMode, ServerConfig, ServerHandle,
    ToolDescriptor, ToolError, ToolResult, classify_server_error,
};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Pages requested from one server before giving up on its cursor chain.
const MAX_LIST_PAGES: usize = 50;

/// Errors surfaced by the registry after its own retry handling.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown server: {0}")]
    UnknownServer(String),

    #[error("Server already registered: {0}")]
    DuplicateServer(String),

    #[error(transparent)]
    InvalidConfig(#[from] DomainError),

    #[error("Server '{server}' is disconnected and reconnect is disabled")]
    Disconnected { server: String },

    #[error("Connection to '{server}' failed after {attempts} attempt(s): {source}")]
    TransientConnection {
        server: String,
        attempts: u32,
        source: TransportError,
    },

    #[error("Session on '{server}' terminated and could not be re-established: {source}")]
    SessionTerminated {
        server: String,
        source: TransportError,
    },

    #[error("Call to '{server}' timed out after {after:?}")]
    Timeout { server: String, after: Duration },

    #[error("Server '{server}' returned an error: {source}")]
    Server {
        server: String,
        source: TransportError,
    },
}

impl RegistryError {
    /// Whether this failure belongs to the transient class.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Disconnected { .. } | Self::TransientConnection { .. } | Self::Timeout { .. }
        )
    }

    /// Render as the error attached to a failed tool call.
    pub fn to_tool_error(&self) -> ToolError {
        match self {
            Self::Timeout { server, .. } => ToolError::timeout(server),
            Self::Disconnected { .. } | Self::TransientConnection { .. } => {
                ToolError::connection(self.to_string())
            }
            Self::SessionTerminated { .. } => ToolError::session_terminated(self.to_string()),
            Self::UnknownServer(server) => ToolError::not_found(server),
            _ => ToolError::execution_failed(self.to_string()),
        }
    }
}

/// Why one attempt could not obtain a connection.
enum AcquireError {
    /// Lost connection and reconnect disabled
    Disconnected,
    Transport {
        error: TransportError,
        had_cookie: bool,
    },
}

struct ServerSlot {
    config: ServerConfig,
    handle: RwLock<ServerHandle>,
    connection: Mutex<Option<Arc<dyn ServerConnection>>>,
    tools: RwLock<Option<Vec<ToolDescriptor>>>,
    /// Next acquire may connect even if reconnect is disabled
    connect_permitted: AtomicBool,
}

impl ServerSlot {
    fn new(config: ServerConfig) -> Self {
        Self {
            handle: RwLock::new(ServerHandle::new(&config)),
            config,
            connection: Mutex::new(None),
            tools: RwLock::new(None),
            connect_permitted: AtomicBool::new(false),
        }
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_ephemeral(&self) -> bool {
        self.config.persistence == PersistenceMode::Ephemeral
    }

    fn snapshot(&self) -> ServerHandle {
        self.handle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut ServerHandle)) {
        let mut handle = self.handle.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut handle);
    }

    fn cached_tools(&self) -> Option<Vec<ToolDescriptor>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_cached_tools(&self, tools: Option<Vec<ToolDescriptor>>) {
        *self.tools.write().unwrap_or_else(PoisonError::into_inner) = tools;
    }
}

/// Resets a `Connecting` state if the connect future is dropped midway.
struct ConnectingGuard<'a> {
    slot: &'a ServerSlot,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.slot.update(|h| {
                if h.connection_state == ConnectionState::Connecting {
                    h.connection_state = ConnectionState::Disconnected;
                }
            });
        }
    }
}

/// Registry of backend server connections.
pub struct ConnectionRegistry {
    connector: Arc<dyn TransportConnector>,
    policy: ReconnectPolicy,
    default_timeout: Duration,
    max_tools_per_server: usize,
    slots: RwLock<Vec<Arc<ServerSlot>>>,
    /// Bumped whenever the set of servers or any server's tool list changes
    tools_epoch: AtomicU64,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new(connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            connector,
            policy: ReconnectPolicy::default(),
            default_timeout: Duration::from_secs(120),
            max_tools_per_server: 100,
            slots: RwLock::new(Vec::new()),
            tools_epoch: AtomicU64::new(0),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Deadline applied when neither caller nor server config sets one.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_max_tools_per_server(mut self, max: usize) -> Self {
        self.max_tools_per_server = max;
        self
    }

    /// Register a server without connecting to it.
    pub fn register(&self, config: ServerConfig) -> Result<(), RegistryError> {
        config.validate()?;
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.iter().any(|s| s.name() == config.name) {
            return Err(RegistryError::DuplicateServer(config.name));
        }
        debug!(server = %config.name, transport = %config.transport.kind(), "Registered server");
        slots.push(Arc::new(ServerSlot::new(config)));
        self.bump_tools_epoch();
        Ok(())
    }

    /// Counter that moves whenever a merged tool view built earlier may be
    /// out of date: a server was registered, announced a list change, or
    /// had its cached list invalidated.
    pub fn tools_epoch(&self) -> u64 {
        self.tools_epoch.load(Ordering::SeqCst)
    }

    fn bump_tools_epoch(&self) {
        self.tools_epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Registered server names, in registration order.
    pub fn server_names(&self) -> Vec<String> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    fn slot(&self, server: &str) -> Result<Arc<ServerSlot>, RegistryError> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.name() == server)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownServer(server.to_string()))
    }

    /// Snapshot of one server's handle. Never connects, never waits.
    pub fn status(&self, server: &str) -> Result<ServerHandle, RegistryError> {
        Ok(self.slot(server)?.snapshot())
    }

    /// Snapshots of every server, in registration order.
    pub fn statuses(&self) -> Vec<ServerHandle> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.snapshot())
            .collect()
    }

    /// Return the handle, connecting a persistent server that has no live
    /// connection yet.
    ///
    /// Ephemeral servers are not contacted.
    pub async fn get_or_create(&self, server: &str) -> Result<ServerHandle, RegistryError> {
        let slot = self.slot(server)?;
        if !slot.is_ephemeral() {
            self.run(&slot, |_| async { Ok(()) }).await?;
        }
        Ok(slot.snapshot())
    }

    /// Open a new connection, replacing any live one.
    ///
    /// The session cookie is retained so the server can resume state. For
    /// ephemeral servers this opens and closes one connection to check reachability.
    pub async fn connect(&self, server: &str) -> Result<ServerHandle, RegistryError> {
        let slot = self.slot(server)?;
        if !slot.is_ephemeral() {
            let previous = slot.connection.lock().await.take();
            if let Some(conn) = previous {
                conn.close().await;
            }
            slot.update(|h| h.connection_state = ConnectionState::Disconnected);
        }
        slot.connect_permitted.store(true, Ordering::SeqCst);
        self.run(&slot, |_| async { Ok(()) }).await?;
        Ok(slot.snapshot())
    }

    /// Connect every persistent server, reporting each outcome.
    pub async fn connect_all(&self) -> Vec<(String, Result<ServerHandle, RegistryError>)> {
        let names = self.server_names();
        let results = futures::future::join_all(names.iter().map(|n| self.get_or_create(n))).await;
        names.into_iter().zip(results).collect()
    }

    /// Close the live connection. The cookie is kept.
    pub async fn disconnect(&self, server: &str) -> Result<(), RegistryError> {
        let slot = self.slot(server)?;
        let conn = slot.connection.lock().await.take();
        if let Some(conn) = conn {
            conn.close().await;
            info!(server = %server, "Disconnected");
        }
        slot.update(|h| h.connection_state = ConnectionState::Disconnected);
        Ok(())
    }

    pub async fn disconnect_all(&self) {
        for name in self.server_names() {
            if let Err(e) = self.disconnect(&name).await {
                warn!(server = %name, error = %e, "Failed to disconnect");
            }
        }
    }

    /// Invoke a tool on a server within a deadline.
    ///
    /// The deadline covers reconnects and retries. `None` falls back to the
    /// server's `request_timeout`, then to the registry default.
    pub async fn invoke(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
        deadline: Option<Duration>,
    ) -> Result<ToolResult, RegistryError> {
        let slot = self.slot(server)?;
        let limit = deadline
            .or(slot.config.request_timeout)
            .unwrap_or(self.default_timeout);

        let call = self.run(&slot, |conn| {
            let arguments = arguments.clone();
            async move { conn.call_tool(tool, arguments).await }
        });

        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(server = %server, tool = %tool, after = ?limit, "Tool call timed out");
                slot.update(|h| {
                    h.connection_state = ConnectionState::Degraded;
                    h.last_error = Some(format!("timed out after {limit:?}"));
                });
                Err(RegistryError::Timeout {
                    server: server.to_string(),
                    after: limit,
                })
            }
        }
    }

    /// The server's tools, filtered by `allowed_tools`.
    ///
    /// Served from cache until the server announces a list change or
    /// [`invalidate_tools`](Self::invalidate_tools) is called.
    pub async fn list_server_tools(
        &self,
        server: &str,
    ) -> Result<Vec<ToolDescriptor>, RegistryError> {
        let slot = self.slot(server)?;
        if self.take_list_changed(&slot).await {
            debug!(server = %server, "Tool list changed, refetching");
            slot.set_cached_tools(None);
            self.bump_tools_epoch();
        }
        if let Some(tools) = slot.cached_tools() {
            return Ok(tools);
        }

        let max = self.max_tools_per_server;
        let config = &slot.config;
        let fetch = self.run(&slot, |conn| async move { fetch_tools(conn, config, max).await });
        let tools = match tokio::time::timeout(self.default_timeout, fetch).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RegistryError::Timeout {
                    server: server.to_string(),
                    after: self.default_timeout,
                });
            }
        };

        debug!(server = %server, count = tools.len(), "Fetched tool list");
        slot.update(|h| h.tool_count = Some(tools.len()));
        slot.set_cached_tools(Some(tools.clone()));
        Ok(tools)
    }

    /// Forget the cached tool list of one server.
    pub fn invalidate_tools(&self, server: &str) -> Result<(), RegistryError> {
        self.slot(server)?.set_cached_tools(None);
        self.bump_tools_epoch();
        Ok(())
    }

    /// Whether the server announced a tool list change since the last check.
    ///
    /// Taking the flag also drops the cached listing.
    pub async fn take_tool_list_changed(&self, server: &str) -> Result<bool, RegistryError> {
        let slot = self.slot(server)?;
        let changed = self.take_list_changed(&slot).await;
        if changed {
            slot.set_cached_tools(None);
            self.bump_tools_epoch();
        }
        Ok(changed)
    }

    async fn take_list_changed(&self, slot: &ServerSlot) -> bool {
        let guard = slot.connection.lock().await;
        guard.as_ref().is_some_and(|c| c.take_tool_list_changed())
    }

    /// Run `op` against a connection, applying the failure policy.
    async fn run<T, F, Fut>(&self, slot: &ServerSlot, op: F) -> Result<T, RegistryError>
    where
        F: Fn(Arc<dyn ServerConnection>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let server = slot.name();
        let mut transient_attempts = 0u32;
        let mut session_reset = false;

        loop {
            let (error, had_cookie, failed) = match self.acquire(slot).await {
                Ok(conn) => {
                    let had_cookie = conn.session_cookie().is_some();
                    let result = op(conn.clone()).await;
                    if slot.is_ephemeral() {
                        conn.close().await;
                        slot.update(|h| h.connection_state = ConnectionState::Disconnected);
                    }
                    match result {
                        Ok(value) => {
                            if !slot.is_ephemeral() {
                                slot.update(|h| {
                                    h.connection_state = ConnectionState::Connected;
                                    h.last_error = None;
                                });
                            }
                            return Ok(value);
                        }
                        Err(error) => (error, had_cookie, Some(conn)),
                    }
                }
                Err(AcquireError::Disconnected) => {
                    return Err(RegistryError::Disconnected {
                        server: server.to_string(),
                    });
                }
                Err(AcquireError::Transport { error, had_cookie }) => (error, had_cookie, None),
            };

            match classify_server_error(&error.payload(had_cookie)) {
                ErrorClass::Fatal => {
                    warn!(server = %server, error = %error, "Server session terminated");
                    self.reset_session(slot, failed.as_ref(), &error).await;
                    if session_reset {
                        return Err(RegistryError::SessionTerminated {
                            server: server.to_string(),
                            source: error,
                        });
                    }
                    session_reset = true;
                    info!(server = %server, "Opening a fresh session");
                }
                ErrorClass::Transient => {
                    transient_attempts += 1;
                    self.mark_degraded(slot, failed.as_ref(), &error).await;
                    let snapshot = slot.snapshot();
                    let reconnect_allowed = slot.is_ephemeral()
                        || slot.config.reconnect_on_disconnect
                        || !snapshot.ever_connected;
                    if !reconnect_allowed || transient_attempts > self.policy.max_attempts {
                        slot.update(|h| h.connection_state = ConnectionState::Disconnected);
                        return Err(RegistryError::TransientConnection {
                            server: server.to_string(),
                            attempts: transient_attempts,
                            source: error,
                        });
                    }
                    let delay = self.policy.delay_for_attempt(transient_attempts);
                    debug!(
                        server = %server,
                        attempt = transient_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, reconnecting"
                    );
                    tokio::time::sleep(delay).await;
                }
                ErrorClass::Other => {
                    slot.update(|h| h.last_error = Some(error.to_string()));
                    return Err(RegistryError::Server {
                        server: server.to_string(),
                        source: error,
                    });
                }
            }
        }
    }

    /// Obtain a connection for one attempt.
    ///
    /// Persistent servers reuse the live connection; ephemeral servers get
    /// a new one that the caller closes.
    async fn acquire(&self, slot: &ServerSlot) -> Result<Arc<dyn ServerConnection>, AcquireError> {
        if slot.is_ephemeral() {
            return self.open(slot).await;
        }

        let mut guard = slot.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            if conn.is_alive() {
                return Ok(conn.clone());
            }
            debug!(server = %slot.name(), "Connection lost");
            conn.close().await;
            *guard = None;
            slot.update(|h| h.connection_state = ConnectionState::Disconnected);
        }

        let handle = slot.snapshot();
        if handle.ever_connected
            && !slot.config.reconnect_on_disconnect
            && !slot.connect_permitted.load(Ordering::SeqCst)
        {
            return Err(AcquireError::Disconnected);
        }

        let conn = self.open(slot).await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn open(&self, slot: &ServerSlot) -> Result<Arc<dyn ServerConnection>, AcquireError> {
        let cookie = slot.snapshot().session_cookie;
        let had_cookie = cookie.is_some();
        slot.update(|h| h.connection_state = ConnectionState::Connecting);
        let mut guard = ConnectingGuard { slot, armed: true };

        debug!(server = %slot.name(), resume = had_cookie, "Connecting");
        let result = self.connector.connect(&slot.config, cookie).await;
        guard.armed = false;

        match result {
            Ok(conn) => {
                slot.connect_permitted.store(false, Ordering::SeqCst);
                let persistent = !slot.is_ephemeral();
                slot.update(|h| {
                    if persistent && h.ever_connected {
                        h.reconnects += 1;
                    }
                    h.connection_state = ConnectionState::Connected;
                    h.session_cookie = conn.session_cookie();
                    h.ever_connected = true;
                    h.last_error = None;
                });
                if persistent {
                    info!(server = %slot.name(), session = conn.session_cookie().is_some(), "Connected");
                }
                Ok(conn)
            }
            Err(error) => {
                slot.update(|h| {
                    h.connection_state = ConnectionState::Disconnected;
                    h.last_error = Some(error.to_string());
                });
                Err(AcquireError::Transport { error, had_cookie })
            }
        }
    }

    /// Drop the connection that failed, unless another caller already
    /// replaced it.
    ///
    /// Returns false when a newer connection is live.
    async fn drop_failed(
        &self,
        slot: &ServerSlot,
        failed: Option<&Arc<dyn ServerConnection>>,
    ) -> bool {
        if slot.is_ephemeral() {
            return true;
        }
        let mut guard = slot.connection.lock().await;
        let replaced = match (guard.as_ref(), failed) {
            (None, _) => return true,
            (Some(current), Some(failed)) => !Arc::ptr_eq(current, failed),
            (Some(_), None) => true,
        };
        if replaced {
            return false;
        }
        if let Some(conn) = guard.take() {
            conn.close().await;
        }
        true
    }

    async fn reset_session(
        &self,
        slot: &ServerSlot,
        failed: Option<&Arc<dyn ServerConnection>>,
        error: &TransportError,
    ) {
        if !self.drop_failed(slot, failed).await {
            return;
        }
        slot.connect_permitted.store(true, Ordering::SeqCst);
        slot.update(|h| {
            h.session_cookie = None;
            h.connection_state = ConnectionState::Disconnected;
            h.last_error = Some(error.to_string());
        });
    }

    async fn mark_degraded(
        &self,
        slot: &ServerSlot,
        failed: Option<&Arc<dyn ServerConnection>>,
        error: &TransportError,
    ) {
        if !self.drop_failed(slot, failed).await {
            return;
        }
        slot.update(|h| {
            h.connection_state = ConnectionState::Degraded;
            h.last_error = Some(error.to_string());
        });
    }
}

/// Follow the `tools/list` cursor chain, keeping allowed tools only.
async fn fetch_tools(
    conn: Arc<dyn ServerConnection>,
    config: &ServerConfig,
    max: usize,
) -> Result<Vec<ToolDescriptor>, TransportError> {
    let mut tools = Vec::new();
    let mut cursor = None;
    for _ in 0..MAX_LIST_PAGES {
        let page = conn.list_tools(cursor.take()).await?;
        tools.extend(page.tools.into_iter().filter(|t| config.allows_tool(&t.name)));
        if tools.len() >= max {
            if tools.len() > max {
                warn!(server = %config.name, max, "Tool list truncated");
                tools.truncate(max);
            }
            break;
        }
        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }
    Ok(tools)
}
