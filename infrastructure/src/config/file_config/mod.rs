//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into domain and
//! application types after [`FileConfig::validate`].

mod runtime;
mod servers;

pub use runtime::{FileCallsConfig, FilePermissionsConfig, FileReconnectConfig};
pub use servers::{FileServerConfig, FileTransportType};

use conductor_application::{ExecutionParams, ReconnectPolicy};
use conductor_domain::ServerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("{field} cannot be 0")]
    InvalidTimeout { field: String },

    #[error("invalid server name '{name}': {reason}")]
    InvalidServerName { name: String, reason: String },

    #[error("server '{0}' is configured more than once")]
    DuplicateServer(String),

    #[error("server '{server}' is missing '{field}'")]
    MissingField { server: String, field: &'static str },

    #[error("reconnect.backoff_multiplier must be at least 1.0, got {0}")]
    InvalidBackoff(f64),

    #[error("reconnect.max_delay_ms must not be below reconnect.initial_delay_ms")]
    InvalidDelayRange,

    #[error("calls.max_tools_per_server cannot be 0")]
    InvalidToolLimit,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Backend servers, in priority order
    pub servers: Vec<FileServerConfig>,
    pub permissions: FilePermissionsConfig,
    pub reconnect: FileReconnectConfig,
    pub calls: FileCallsConfig,
}

impl FileConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            server.to_server_config()?;
            if !seen.insert(server.name.as_str()) {
                return Err(ConfigValidationError::DuplicateServer(server.name.clone()));
            }
        }

        if self.calls.timeout_seconds == 0 {
            return Err(ConfigValidationError::InvalidTimeout {
                field: "calls.timeout_seconds".to_string(),
            });
        }
        if self.calls.max_tools_per_server == 0 {
            return Err(ConfigValidationError::InvalidToolLimit);
        }

        let multiplier = self.reconnect.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(ConfigValidationError::InvalidBackoff(multiplier));
        }
        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            return Err(ConfigValidationError::InvalidDelayRange);
        }

        Ok(())
    }

    /// Domain configs of the enabled servers, in file order.
    pub fn server_configs(&self) -> Result<Vec<ServerConfig>, ConfigValidationError> {
        self.servers
            .iter()
            .filter(|s| s.enabled)
            .map(FileServerConfig::to_server_config)
            .collect()
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.reconnect.to_policy()
    }

    pub fn execution_params(&self) -> ExecutionParams {
        ExecutionParams::default()
            .with_call_timeout(Duration::from_secs(self.calls.timeout_seconds))
            .with_permission_mode(self.permissions.mode)
            .with_max_tools_per_server(self.calls.max_tools_per_server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::{PermissionMode, TransportKind};

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[permissions]
mode = "allow_all"
persist = false

[reconnect]
max_attempts = 5
initial_delay_ms = 50
max_delay_ms = 1000
backoff_multiplier = 1.5

[calls]
timeout_seconds = 30

[[servers]]
name = "A"
type = "stdio"
command = "server-a"

[[servers]]
name = "B"
type = "tcp"
address = "127.0.0.1:9000"

[[servers]]
name = "C"
command = "server-c"
enabled = false
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();

        let servers = config.server_configs().unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].name, "A");
        assert_eq!(servers[1].transport.kind(), TransportKind::Tcp);

        let params = config.execution_params();
        assert_eq!(params.call_timeout, Duration::from_secs(30));
        assert_eq!(params.permission_mode, PermissionMode::AllowAll);

        let policy = config.reconnect_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: FileConfig = toml::from_str("[calls]\ntimeout_seconds = 5").unwrap();
        assert_eq!(config.calls.timeout_seconds, 5);
        assert!(config.servers.is_empty());
        assert_eq!(config.permissions.mode, PermissionMode::Ask);
        assert!(config.permissions.persist);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(FileConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config: FileConfig = toml::from_str("[calls]\ntimeout_seconds = 0").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn test_validate_duplicate_server() {
        let toml_str = r#"
[[servers]]
name = "A"
command = "one"

[[servers]]
name = "A"
command = "two"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::DuplicateServer("A".into()))
        );
    }

    #[test]
    fn test_validate_backoff() {
        let config: FileConfig =
            toml::from_str("[reconnect]\nbackoff_multiplier = 0.5").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidBackoff(_))
        ));

        let config: FileConfig =
            toml::from_str("[reconnect]\ninitial_delay_ms = 500\nmax_delay_ms = 100").unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::InvalidDelayRange)
        );
    }
}
