//! Port for reporting tool call progress to the driving client.
//!
//! The tracker calls [`SessionUpdateSink::notify`] once per transition,
//! synchronously and in order. The method is non-fallible: delivery
//! problems belong to the adapter, never to the tool call.

use conductor_domain::{SessionId, ToolCallId, ToolCallStatus, ToolContent, ToolError, ToolKind};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// One tool call notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallUpdate {
    pub session_id: SessionId,
    pub tool_call_id: ToolCallId,
    pub status: ToolCallStatus,
    pub title: String,
    pub kind: ToolKind,
    pub server_name: String,
    pub tool_name: String,
    /// Arguments, sent with the initial `pending` notification only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ToolContent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}

/// Receives tool call notifications.
pub trait SessionUpdateSink: Send + Sync {
    fn notify(&self, update: ToolCallUpdate);
}

/// No-op implementation for tests and headless runs.
pub struct NoSessionUpdates;

impl SessionUpdateSink for NoSessionUpdates {
    fn notify(&self, _update: ToolCallUpdate) {}
}

/// Forwards notifications into an unbounded channel.
///
/// Unbounded so `notify` never blocks; a dropped receiver discards updates.
pub struct ChannelSessionUpdates {
    sender: mpsc::UnboundedSender<ToolCallUpdate>,
}

impl ChannelSessionUpdates {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ToolCallUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl SessionUpdateSink for ChannelSessionUpdates {
    fn notify(&self, update: ToolCallUpdate) {
        if self.sender.send(update).is_err() {
            tracing::trace!("session update receiver dropped");
        }
    }
}

/// Fans one notification out to several sinks, in order.
pub struct CompositeSessionUpdates {
    sinks: Vec<std::sync::Arc<dyn SessionUpdateSink>>,
}

impl CompositeSessionUpdates {
    pub fn new(sinks: Vec<std::sync::Arc<dyn SessionUpdateSink>>) -> Self {
        Self { sinks }
    }
}

impl SessionUpdateSink for CompositeSessionUpdates {
    fn notify(&self, update: ToolCallUpdate) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.notify(update.clone());
            }
            last.notify(update);
        }
    }
}
