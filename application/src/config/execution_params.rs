//! Execution parameters - tool call control.
//!
//! [`ExecutionParams`] groups the static parameters used by the
//! aggregator and the prompt turn use case.

use conductor_domain::PermissionMode;
use std::time::Duration;

/// Tool call control parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionParams {
    /// Deadline for one tool invocation, including reconnects.
    pub call_timeout: Duration,
    /// How the permission gate decides.
    pub permission_mode: PermissionMode,
    /// Upper bound on tools fetched from one server.
    pub max_tools_per_server: usize,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(120),
            permission_mode: PermissionMode::Ask,
            max_tools_per_server: 100,
        }
    }
}

impl ExecutionParams {
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = mode;
        self
    }

    pub fn with_max_tools_per_server(mut self, max: usize) -> Self {
        self.max_tools_per_server = max;
        self
    }
}
