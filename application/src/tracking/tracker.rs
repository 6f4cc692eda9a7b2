//! Tool Call Tracker
//!
//! Owns the state of every in-flight [`ToolCall`] and reports each
//! transition to the [`SessionUpdateSink`].
//!
//! ```text
//! create ──> Pending ──update──> InProgress ──complete──> Completed | Failed
//!               └───────────────complete──────────────────┘
//! ```
//!
//! Notifications are emitted while the tracker lock is held, so for any
//! one call id the sink observes transitions in exactly the order the
//! tracker applied them. Sinks must not call back into the tracker.
//!
//! Completed calls are evicted; their ids are remembered in a bounded
//! history so a second `complete` is rejected rather than mistaken for an
//! unknown id.

use crate::ports::session_update::{SessionUpdateSink, ToolCallUpdate};
use conductor_domain::{DomainError, ToolCall, ToolCallId, ToolCallStatus, ToolContent, ToolError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{trace, warn};

/// Completed ids remembered for double-completion detection.
const COMPLETED_HISTORY: usize = 4096;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Tool call already completed: {0}")]
    AlreadyCompleted(ToolCallId),

    #[error("Unknown tool call: {0}")]
    UnknownCall(ToolCallId),

    #[error(transparent)]
    InvalidTransition(#[from] DomainError),
}

/// Fields an `update` may change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallProgress {
    pub status: Option<ToolCallStatus>,
    pub progress: Option<String>,
    pub content: Option<Vec<ToolContent>>,
}

impl ToolCallProgress {
    pub fn status(status: ToolCallStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn message(progress: impl Into<String>) -> Self {
        Self {
            progress: Some(progress.into()),
            ..Default::default()
        }
    }
}

#[derive(Default)]
struct TrackerState {
    active: HashMap<ToolCallId, ToolCall>,
    completed: HashSet<ToolCallId>,
    completed_order: VecDeque<ToolCallId>,
}

impl TrackerState {
    fn remember_completed(&mut self, id: ToolCallId) {
        if self.completed_order.len() == COMPLETED_HISTORY
            && let Some(oldest) = self.completed_order.pop_front()
        {
            self.completed.remove(&oldest);
        }
        self.completed.insert(id.clone());
        self.completed_order.push_back(id);
    }
}

/// Tracks tool calls and notifies the driving client.
pub struct ToolCallTracker {
    sink: Arc<dyn SessionUpdateSink>,
    state: Mutex<TrackerState>,
}

impl ToolCallTracker {
    pub fn new(sink: Arc<dyn SessionUpdateSink>) -> Self {
        Self {
            sink,
            state: Mutex::new(TrackerState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking a call and emit its `pending` notification.
    pub fn create(&self, call: ToolCall) -> ToolCallId {
        let id = call.id.clone();
        let mut state = self.lock();
        self.sink.notify(ToolCallUpdate {
            raw_input: Some(call.arguments.clone()),
            ..base_update(&call)
        });
        trace!(call_id = %id, tool = %call.tool_name, server = %call.server_name, "Tool call created");
        state.active.insert(id.clone(), call);
        id
    }

    /// Apply a non-terminal update.
    ///
    /// Returns `Ok(false)` (with a warning) for ids that are unknown or
    /// already completed.
    pub fn update(&self, id: &ToolCallId, progress: ToolCallProgress) -> Result<bool, TrackerError> {
        let mut state = self.lock();
        let Some(call) = state.active.get_mut(id) else {
            warn!(call_id = %id, "Update for unknown tool call ignored");
            return Ok(false);
        };

        if let Some(status) = progress.status {
            if status.is_terminal() {
                return Err(DomainError::InvalidTransition {
                    from: call.status.to_string(),
                    to: status.to_string(),
                }
                .into());
            }
            call.transition(status)?;
        }
        if let Some(content) = &progress.content {
            call.content = content.clone();
        }

        self.sink.notify(ToolCallUpdate {
            content: progress.content,
            progress: progress.progress,
            ..base_update(call)
        });
        Ok(true)
    }

    /// Finish a call, emit its terminal notification and evict it.
    ///
    /// The call ends `Failed` when `error` is set, `Completed` otherwise.
    pub fn complete(
        &self,
        id: &ToolCallId,
        content: Vec<ToolContent>,
        error: Option<ToolError>,
    ) -> Result<ToolCall, TrackerError> {
        let mut state = self.lock();
        let Some(mut call) = state.active.remove(id) else {
            if state.completed.contains(id) {
                warn!(call_id = %id, "Tool call completed twice");
                return Err(TrackerError::AlreadyCompleted(id.clone()));
            }
            warn!(call_id = %id, "Completion for unknown tool call");
            return Err(TrackerError::UnknownCall(id.clone()));
        };

        let status = if error.is_some() {
            ToolCallStatus::Failed
        } else {
            ToolCallStatus::Completed
        };
        if let Err(e) = call.transition(status) {
            state.active.insert(id.clone(), call);
            return Err(e.into());
        }
        call.content = content;
        call.error = error;

        self.sink.notify(ToolCallUpdate {
            content: Some(call.content.clone()),
            error: call.error.clone(),
            ..base_update(&call)
        });
        trace!(call_id = %id, status = %call.status, "Tool call completed");
        state.remember_completed(id.clone());
        Ok(call)
    }

    /// Current record of an in-flight call.
    pub fn get(&self, id: &ToolCallId) -> Option<ToolCall> {
        self.lock().active.get(id).cloned()
    }

    /// Number of in-flight calls.
    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }
}

fn base_update(call: &ToolCall) -> ToolCallUpdate {
    ToolCallUpdate {
        session_id: call.session_id.clone(),
        tool_call_id: call.id.clone(),
        status: call.status,
        title: call.title.clone(),
        kind: call.kind,
        server_name: call.server_name.clone(),
        tool_name: call.tool_name.clone(),
        raw_input: None,
        content: None,
        error: None,
        progress: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;
    use conductor_domain::SessionId;
    use serde_json::json;

    fn tracker() -> (ToolCallTracker, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (ToolCallTracker::new(sink.clone()), sink)
    }

    fn call() -> ToolCall {
        ToolCall::new(SessionId::new("s1"), "A", "echo", json!({"text": "hi"}))
    }

    #[test]
    fn test_full_lifecycle_emits_in_order() {
        let (tracker, sink) = tracker();
        let id = tracker.create(call());
        assert!(
            tracker
                .update(&id, ToolCallProgress::status(ToolCallStatus::InProgress))
                .unwrap()
        );
        let done = tracker
            .complete(&id, vec![ToolContent::text("hi")], None)
            .unwrap();

        assert_eq!(done.status, ToolCallStatus::Completed);
        assert_eq!(
            sink.statuses(),
            vec![
                ToolCallStatus::Pending,
                ToolCallStatus::InProgress,
                ToolCallStatus::Completed
            ]
        );
        assert_eq!(tracker.active_count(), 0);

        let updates = sink.updates.lock().unwrap();
        assert_eq!(updates[0].raw_input, Some(json!({"text": "hi"})));
        assert_eq!(updates[2].content, Some(vec![ToolContent::text("hi")]));
    }

    #[test]
    fn test_failed_completion_carries_error() {
        let (tracker, sink) = tracker();
        let id = tracker.create(call());
        let done = tracker
            .complete(&id, vec![], Some(ToolError::permission_denied("A__echo")))
            .unwrap();
        assert_eq!(done.status, ToolCallStatus::Failed);
        let updates = sink.updates.lock().unwrap();
        assert_eq!(updates.last().unwrap().error.as_ref().unwrap().code, "PERMISSION_DENIED");
    }

    #[test]
    fn test_double_complete_rejected() {
        let (tracker, sink) = tracker();
        let id = tracker.create(call());
        tracker.complete(&id, vec![], None).unwrap();
        assert_eq!(
            tracker.complete(&id, vec![], None).unwrap_err(),
            TrackerError::AlreadyCompleted(id.clone())
        );
        // The rejected completion emits nothing
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_unknown_ids_are_ignored_by_update() {
        let (tracker, sink) = tracker();
        let applied = tracker
            .update(&ToolCallId::new("nope"), ToolCallProgress::message("50%"))
            .unwrap();
        assert!(!applied);
        assert_eq!(sink.len(), 0);

        assert!(matches!(
            tracker.complete(&ToolCallId::new("nope"), vec![], None),
            Err(TrackerError::UnknownCall(_))
        ));
    }

    #[test]
    fn test_update_after_complete_is_ignored() {
        let (tracker, sink) = tracker();
        let id = tracker.create(call());
        tracker.complete(&id, vec![], None).unwrap();
        assert!(!tracker.update(&id, ToolCallProgress::message("late")).unwrap());
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_update_cannot_move_backward_or_finish() {
        let (tracker, sink) = tracker();
        let id = tracker.create(call());
        tracker
            .update(&id, ToolCallProgress::status(ToolCallStatus::InProgress))
            .unwrap();

        assert!(
            tracker
                .update(&id, ToolCallProgress::status(ToolCallStatus::Pending))
                .is_err()
        );
        assert!(
            tracker
                .update(&id, ToolCallProgress::status(ToolCallStatus::Completed))
                .is_err()
        );
        assert_eq!(tracker.get(&id).unwrap().status, ToolCallStatus::InProgress);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_progress_message_keeps_status() {
        let (tracker, sink) = tracker();
        let id = tracker.create(call());
        tracker
            .update(&id, ToolCallProgress::status(ToolCallStatus::InProgress))
            .unwrap();
        tracker.update(&id, ToolCallProgress::message("halfway")).unwrap();

        let updates = sink.updates.lock().unwrap();
        assert_eq!(updates[2].status, ToolCallStatus::InProgress);
        assert_eq!(updates[2].progress.as_deref(), Some("halfway"));
    }

    #[test]
    fn test_concurrent_calls_tracked_independently() {
        let (tracker, _sink) = tracker();
        let a = tracker.create(call());
        let b = tracker.create(call());
        assert_ne!(a, b);
        assert_eq!(tracker.active_count(), 2);
        tracker.complete(&a, vec![], None).unwrap();
        assert_eq!(tracker.active_count(), 1);
        assert!(tracker.get(&b).is_some());
    }

    #[test]
    fn test_completed_history_is_bounded() {
        let (tracker, _sink) = tracker();
        let first = tracker.create(call());
        tracker.complete(&first, vec![], None).unwrap();
        for _ in 0..COMPLETED_HISTORY {
            let id = tracker.create(call());
            tracker.complete(&id, vec![], None).unwrap();
        }
        // Evicted from history: reported as unknown rather than double-completed
        assert!(matches!(
            tracker.complete(&first, vec![], None),
            Err(TrackerError::UnknownCall(_))
        ));
    }
}
