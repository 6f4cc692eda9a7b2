//! Permission Gate
//!
//! Decides whether a pending tool call may run.
//!
//! # Flow
//!
//! ```text
//! PermissionMode::AllowAll / DenyAll ──> fixed answer
//!        ↓ (Ask)
//! PermissionStore hit ──> remembered answer, arbiter not consulted
//!        ↓ (miss)
//! PermissionArbiter (raced with cancellation)
//!        ↓
//! allow_always / reject_always ──> written to the store before returning
//! ```
//!
//! Cancellation, an arbiter-side cancel, or an arbiter failure all deny
//! the call and record nothing. Checks for the same `(server, tool)` are
//! serialized, so an "always" answer given to the first of two concurrent
//! calls is seen by the second without a second prompt.

use crate::ports::permission_arbiter::{PermissionArbiter, PermissionRequest};
use crate::ports::permission_store::PermissionStore;
use conductor_domain::{
    DecisionSource, GateDecision, PermissionKey, PermissionMode, PermissionOption,
    PermissionOutcome, ToolCall,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct PermissionGate {
    store: Arc<dyn PermissionStore>,
    arbiter: Arc<dyn PermissionArbiter>,
    mode: PermissionMode,
    key_locks: Mutex<HashMap<PermissionKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl PermissionGate {
    pub fn new(store: Arc<dyn PermissionStore>, arbiter: Arc<dyn PermissionArbiter>) -> Self {
        Self {
            store,
            arbiter,
            mode: PermissionMode::Ask,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_mode(mut self, mode: PermissionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }

    fn key_lease(&self, key: PermissionKey) -> KeyLease<'_> {
        let lock = self
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        KeyLease {
            gate: self,
            key,
            lock,
        }
    }

    #[cfg(test)]
    fn key_lock_count(&self) -> usize {
        self.key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Decide whether `call` may run.
    pub async fn check(&self, call: &ToolCall, cancel: &CancellationToken) -> GateDecision {
        match self.mode {
            PermissionMode::AllowAll => {
                return GateDecision {
                    allow: true,
                    remember: false,
                    source: DecisionSource::Policy,
                };
            }
            PermissionMode::DenyAll => return GateDecision::denied(DecisionSource::Policy),
            PermissionMode::Ask => {}
        }

        let key = PermissionKey::new(&call.server_name, &call.tool_name);
        let lease = self.key_lease(key.clone());
        let _serialized = tokio::select! {
            biased;
            _ = cancel.cancelled() => return GateDecision::denied(DecisionSource::Cancelled),
            guard = lease.lock.lock() => guard,
        };

        match self.store.get(&key) {
            Ok(Some(decision)) => {
                debug!(key = %key, decision = %decision, "Permission from store");
                return GateDecision::from_store(decision);
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Permission store read failed, asking"),
        }

        let request = PermissionRequest {
            session_id: call.session_id.clone(),
            tool_call_id: call.id.clone(),
            server_name: call.server_name.clone(),
            tool_name: call.tool_name.clone(),
            title: call.title.clone(),
            kind: call.kind,
            arguments: call.arguments.clone(),
            options: PermissionOption::ALL.to_vec(),
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(key = %key, "Permission request cancelled");
                return GateDecision::denied(DecisionSource::Cancelled);
            }
            outcome = self.arbiter.request_permission(request) => outcome,
        };

        let outcome = match outcome {
            Ok(PermissionOutcome::Cancelled) => {
                return GateDecision::denied(DecisionSource::Cancelled);
            }
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(key = %key, error = %e, "Permission arbiter failed, denying");
                return GateDecision::denied(DecisionSource::ArbiterError);
            }
        };

        let mut remember = false;
        if let Some(decision) = outcome.remembered() {
            match self.store.set(&key, decision) {
                Ok(()) => {
                    info!(key = %key, decision = %decision, "Permission remembered");
                    remember = true;
                }
                Err(e) => warn!(key = %key, error = %e, "Failed to remember permission"),
            }
        }

        GateDecision {
            allow: outcome.allows(),
            remember,
            source: DecisionSource::Arbiter,
        }
    }
}

/// Holds one key's serialization lock; the map entry goes with the last holder.
struct KeyLease<'a> {
    gate: &'a PermissionGate,
    key: PermissionKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .gate
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // one reference in the map, one here
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}
