//! Newline-delimited JSON-RPC channel over any byte stream.
//!
//! Used for stdio (child process pipes) and TCP servers. A single
//! background reader task owns the read half and dispatches every frame:
//!
//! - **Response** → `pending` oneshot (request correlation by id)
//! - **Notification `tools/list_changed`** → sets the list-changed flag
//! - **Incoming request** → answered directly (`ping`) or rejected
//!
//! When the reader ends, every pending sender is dropped so waiters observe
//! [`TransportError::Closed`].

use super::RpcChannel;
use super::protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JsonRpcResponseOut, METHOD_PING,
    METHOD_TOOLS_LIST_CHANGED, MessageKind, attach_session, classify_message,
};
use async_trait::async_trait;
use conductor_application::TransportError;
use conductor_domain::SessionCookie;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::Child;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type PendingMap = Arc<std::sync::Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// A JSON-RPC channel framed by newlines.
pub struct LineChannel {
    server_name: String,
    writer: Arc<Mutex<BufWriter<BoxedWriter>>>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    list_changed: Arc<AtomicBool>,
    cookie: RwLock<Option<SessionCookie>>,
    reader_handle: JoinHandle<()>,
    /// Child process for stdio servers (killed on close/drop)
    child: Option<Mutex<Child>>,
}

impl LineChannel {
    /// Start the reader task over `reader` and wrap `writer`.
    pub fn new<R, W>(server_name: impl Into<String>, reader: R, writer: W, child: Option<Child>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let server_name = server_name.into();
        let writer: Arc<Mutex<BufWriter<BoxedWriter>>> =
            Arc::new(Mutex::new(BufWriter::new(Box::new(writer))));
        let pending: PendingMap = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let list_changed = Arc::new(AtomicBool::new(false));

        let reader_handle = tokio::spawn(reader_loop(
            server_name.clone(),
            BufReader::new(reader),
            Arc::clone(&pending),
            Arc::clone(&alive),
            Arc::clone(&list_changed),
            Arc::clone(&writer),
        ));

        Self {
            server_name,
            writer,
            pending,
            alive,
            list_changed,
            cookie: RwLock::new(None),
            reader_handle,
            child: child.map(Mutex::new),
        }
    }

    fn cookie(&self) -> Option<SessionCookie> {
        self.cookie
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_pending(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<JsonRpcResponse>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn send_line<T: Serialize>(&self, message: &T) -> Result<(), TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        write_line(&self.writer, message).await.inspect_err(|_| {
            self.alive.store(false, Ordering::SeqCst);
        })
    }
}

async fn write_line<T: Serialize>(
    writer: &Mutex<BufWriter<BoxedWriter>>,
    message: &T,
) -> Result<(), TransportError> {
    let mut json =
        serde_json::to_string(message).map_err(|e| TransportError::Protocol(e.to_string()))?;
    trace!("Line channel sending: {}", json);
    json.push('\n');
    let mut writer = writer.lock().await;
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| TransportError::Io(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::Io(e.to_string()))
}

/// Background reader loop, single owner of the read half.
async fn reader_loop<R: AsyncRead + Unpin>(
    server_name: String,
    mut reader: BufReader<R>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    list_changed: Arc<AtomicBool>,
    writer: Arc<Mutex<BufWriter<BoxedWriter>>>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!(server = %server_name, "Line channel closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(server = %server_name, error = %e, "Line channel read error");
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        trace!("Line channel received: {}", trimmed);

        let message: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                // Servers may print non-protocol output to stdout
                debug!(server = %server_name, error = %e, "Skipping non-JSON line");
                continue;
            }
        };

        match classify_message(&message) {
            MessageKind::Response => {
                let response: JsonRpcResponse = match serde_json::from_value(message) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(server = %server_name, error = %e, "Failed to parse response");
                        continue;
                    }
                };
                let Some(id) = response.id else {
                    continue;
                };
                let sender = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                match sender {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!(server = %server_name, id, "No pending request for response"),
                }
            }
            MessageKind::IncomingRequest => {
                let id = message.get("id").cloned().unwrap_or(Value::Null);
                let method = message
                    .get("method")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let reply = if method == METHOD_PING {
                    JsonRpcResponseOut::result(id, Value::Object(Default::default()))
                } else {
                    debug!(server = %server_name, method, "Rejecting server request");
                    JsonRpcResponseOut::method_not_found(id, method)
                };
                if let Err(e) = write_line(&writer, &reply).await {
                    warn!(server = %server_name, error = %e, "Failed to answer server request");
                }
            }
            MessageKind::Notification => {
                let method = message.get("method").and_then(Value::as_str);
                if method == Some(METHOD_TOOLS_LIST_CHANGED) {
                    debug!(server = %server_name, "Tool list changed");
                    list_changed.store(true, Ordering::SeqCst);
                } else {
                    trace!(server = %server_name, method = ?method, "Ignoring notification");
                }
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

#[async_trait]
impl RpcChannel for LineChannel {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let params = attach_session(params, self.cookie().as_ref());
        let request = JsonRpcRequest::new(method, Some(params));
        let request_id = request.id;

        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(request_id, tx);

        if let Err(e) = self.send_line(&request).await {
            self.lock_pending().remove(&request_id);
            return Err(e);
        }

        // Dropped waiters (timeout, cancellation) must not leak entries
        let mut cleanup = PendingCleanup {
            pending: &self.pending,
            id: request_id,
            armed: true,
        };
        let response = rx.await.map_err(|_| TransportError::Closed)?;
        cleanup.armed = false;
        response.into_result()
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        let params = attach_session(params, self.cookie().as_ref());
        self.send_line(&JsonRpcNotification::new(method, Some(params)))
            .await
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
        if self.alive.swap(false, Ordering::SeqCst) {
            debug!(server = %self.server_name, "Closing line channel");
        }
        self.reader_handle.abort();
        self.lock_pending().clear();
        let _ = self.writer.lock().await.shutdown().await;
        if let Some(child) = &self.child {
            let _ = child.lock().await.start_kill();
        }
    }
}

impl Drop for LineChannel {
    fn drop(&mut self) {
        self.reader_handle.abort();
        if let Some(child) = &mut self.child {
            let _ = child.get_mut().start_kill();
        }
    }
}

struct PendingCleanup<'a> {
    pending: &'a PendingMap,
    id: u64,
    armed: bool,
}

impl Drop for PendingCleanup<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}
