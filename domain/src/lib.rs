//! Domain layer for conductor
//!
//! This crate contains the data model of the tool-execution core: tool
//! descriptors and name resolution, the tool call state machine, server
//! handles and error classification, permission decisions and
//! conversational sessions. It performs no I/O.
//!
//! # Core Concepts
//!
//! ## Namespacing
//!
//! Every tool is addressable as `<server>__<tool>`. A bare tool name is
//! also accepted when exactly one connected server exposes it.
//!
//! ## Tool Call Lifecycle
//!
//! `Pending -> InProgress -> Completed | Failed`, strictly forward.

pub mod core;
pub mod permission;
pub mod server;
pub mod session;
pub mod tool;

// Re-export commonly used types
pub use core::{error::DomainError, string::truncate};
pub use permission::entities::{
    DecisionSource, GateDecision, PermissionDecision, PermissionKey, PermissionMode,
    PermissionOption, PermissionOutcome, PermissionRecord,
};
pub use server::{
    entities::{
        ConnectionState, PersistenceMode, ServerConfig, ServerHandle, SessionCookie, TransportKind,
        TransportSpec,
    },
    error_class::{
        ErrorClass, SESSION_REQUIRED_CODE, SESSION_TERMINATED_CODE, ServerErrorPayload,
        classify_server_error,
    },
};
pub use session::entities::{ConversationSession, SessionId, SessionMode};
pub use tool::{
    call::{ToolCall, ToolCallId, ToolCallStatus, ToolKind},
    entities::{Resolution, ToolCatalog, ToolDescriptor},
    naming::{NAMESPACE_SEPARATOR, nearest_names, qualify, split_namespaced, validate_server_name},
    value_objects::{ToolContent, ToolError, ToolResult},
};
