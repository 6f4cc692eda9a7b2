//! Server configuration from TOML (`[[servers]]` array)
//!
//! ```toml
//! [[servers]]
//! name = "fs"
//! type = "stdio"
//! command = "mcp-fs"
//! args = ["--root", "."]
//!
//! [[servers]]
//! name = "search"
//! type = "http"
//! url = "https://search.example/mcp"
//! headers = { Authorization = "Bearer abc" }
//! persistence = "ephemeral"
//! ```

use super::ConfigValidationError;
use conductor_domain::{PersistenceMode, ServerConfig, TransportSpec, validate_server_name};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Transport types accepted in `type = "..."`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTransportType {
    #[default]
    Stdio,
    Http,
    Tcp,
}

/// Raw server entry from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileServerConfig {
    pub name: String,
    /// Disabled entries are validated but never registered
    pub enabled: bool,
    #[serde(rename = "type")]
    pub transport: FileTransportType,

    // stdio
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,

    // http
    pub url: Option<String>,
    pub headers: HashMap<String, String>,

    // tcp
    pub address: Option<String>,

    pub persistence: PersistenceMode,
    /// Reconnect a lost persistent connection on the next call
    pub reconnect: bool,
    pub request_timeout_seconds: Option<u64>,
    pub allowed_tools: Option<Vec<String>>,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            transport: FileTransportType::default(),
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            url: None,
            headers: HashMap::new(),
            address: None,
            persistence: PersistenceMode::default(),
            reconnect: true,
            request_timeout_seconds: None,
            allowed_tools: None,
        }
    }
}

fn required(
    value: &Option<String>,
    server: &str,
    field: &'static str,
) -> Result<String, ConfigValidationError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigValidationError::MissingField {
            server: server.to_string(),
            field,
        }),
    }
}

impl FileServerConfig {
    /// Convert to the domain [`ServerConfig`], checking the fields the
    /// selected transport needs.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigValidationError> {
        validate_server_name(&self.name).map_err(|e| ConfigValidationError::InvalidServerName {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;

        let transport = match self.transport {
            FileTransportType::Stdio => TransportSpec::Stdio {
                command: required(&self.command, &self.name, "command")?,
                args: self.args.clone(),
                env: self.env.clone(),
            },
            FileTransportType::Http => TransportSpec::Http {
                url: required(&self.url, &self.name, "url")?,
                headers: self.headers.clone(),
            },
            FileTransportType::Tcp => TransportSpec::Tcp {
                address: required(&self.address, &self.name, "address")?,
            },
        };

        let mut config = ServerConfig::new(self.name.clone(), transport)
            .with_persistence(self.persistence)
            .with_reconnect(self.reconnect);

        match self.request_timeout_seconds {
            Some(0) => {
                return Err(ConfigValidationError::InvalidTimeout {
                    field: format!("servers.{}.request_timeout_seconds", self.name),
                });
            }
            Some(secs) => config = config.with_request_timeout(Duration::from_secs(secs)),
            None => {}
        }

        if let Some(tools) = &self.allowed_tools {
            config = config.with_allowed_tools(tools.clone());
        }

        Ok(config)
    }
}
