//! Runtime sections from TOML (`[permissions]`, `[reconnect]`, `[calls]`)

use conductor_application::{ExecutionParams, ReconnectPolicy};
use conductor_domain::PermissionMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Raw permission configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePermissionsConfig {
    /// `ask`, `allow_all` or `deny_all`
    pub mode: PermissionMode,
    /// Keep "always" decisions across runs
    pub persist: bool,
    /// Table location; defaults to the user data directory
    pub path: Option<PathBuf>,
}

impl Default for FilePermissionsConfig {
    fn default() -> Self {
        Self {
            mode: PermissionMode::Ask,
            persist: true,
            path: None,
        }
    }
}

/// Raw reconnect backoff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileReconnectConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for FileReconnectConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier,
        }
    }
}

impl FileReconnectConfig {
    pub fn to_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

/// Raw tool call configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCallsConfig {
    /// Deadline for one tool invocation
    pub timeout_seconds: u64,
    /// Upper bound on tools listed per server
    pub max_tools_per_server: usize,
}

impl Default for FileCallsConfig {
    fn default() -> Self {
        let params = ExecutionParams::default();
        Self {
            timeout_seconds: params.call_timeout.as_secs(),
            max_tools_per_server: params.max_tools_per_server,
        }
    }
}
