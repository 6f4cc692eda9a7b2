//! Infrastructure layer for conductor
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: tool-server transports, the file-backed
//! permission store, the JSONL session update log and configuration
//! file loading.

pub mod config;
pub mod logging;
pub mod permissions;
pub mod transport;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileCallsConfig, FileConfig, FilePermissionsConfig,
    FileReconnectConfig, FileServerConfig, FileTransportType,
};
pub use logging::JsonlSessionUpdateLog;
pub use permissions::FilePermissionStore;
pub use transport::{McpConnection, McpConnector, RpcChannel};
