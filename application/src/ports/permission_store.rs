//! Permission store port.
//!
//! Maps `(server, tool)` to a remembered [`PermissionDecision`]. The
//! methods are synchronous: implementations serialize writers internally
//! and readers observe either the state before or after a write.

use conductor_domain::{PermissionDecision, PermissionKey, PermissionRecord};
use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PermissionStoreError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Malformed permission table at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("Permission store lock poisoned")]
    Poisoned,
}

/// Durable mapping of `(server, tool)` to a remembered decision.
pub trait PermissionStore: Send + Sync {
    fn get(&self, key: &PermissionKey) -> Result<Option<PermissionDecision>, PermissionStoreError>;

    fn set(
        &self,
        key: &PermissionKey,
        decision: PermissionDecision,
    ) -> Result<(), PermissionStoreError>;

    /// Remove one decision. Returns whether it existed.
    fn remove(&self, key: &PermissionKey) -> Result<bool, PermissionStoreError>;

    /// Remove every decision. Idempotent.
    fn clear(&self) -> Result<(), PermissionStoreError>;

    /// All decisions, ordered by key.
    fn list(&self) -> Result<Vec<PermissionRecord>, PermissionStoreError>;
}

/// Process-lifetime store for non-persistent mode and tests.
#[derive(Default)]
pub struct InMemoryPermissionStore {
    entries: RwLock<BTreeMap<PermissionKey, PermissionDecision>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionStore for InMemoryPermissionStore {
    fn get(&self, key: &PermissionKey) -> Result<Option<PermissionDecision>, PermissionStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| PermissionStoreError::Poisoned)?;
        Ok(entries.get(key).copied())
    }

    fn set(
        &self,
        key: &PermissionKey,
        decision: PermissionDecision,
    ) -> Result<(), PermissionStoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| PermissionStoreError::Poisoned)?;
        entries.insert(key.clone(), decision);
        Ok(())
    }

    fn remove(&self, key: &PermissionKey) -> Result<bool, PermissionStoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| PermissionStoreError::Poisoned)?;
        Ok(entries.remove(key).is_some())
    }

    fn clear(&self) -> Result<(), PermissionStoreError> {
        self.entries
            .write()
            .map_err(|_| PermissionStoreError::Poisoned)?
            .clear();
        Ok(())
    }

    fn list(&self) -> Result<Vec<PermissionRecord>, PermissionStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| PermissionStoreError::Poisoned)?;
        Ok(entries
            .iter()
            .map(|(key, decision)| PermissionRecord {
                server_name: key.server.clone(),
                tool_name: key.tool.clone(),
                decision: *decision,
            })
            .collect())
    }
}
