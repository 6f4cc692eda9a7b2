//! Application layer for conductor
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod connection;
pub mod permission;
pub mod ports;
pub mod session;
pub mod tracking;
pub mod use_cases;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{ExecutionParams, ReconnectPolicy};
pub use connection::registry::{ConnectionRegistry, RegistryError};
pub use permission::gate::PermissionGate;
pub use ports::{
    permission_arbiter::{
        ArbiterError, AutoApproveArbiter, AutoRejectArbiter, PermissionArbiter, PermissionRequest,
    },
    permission_store::{InMemoryPermissionStore, PermissionStore, PermissionStoreError},
    session_update::{
        ChannelSessionUpdates, CompositeSessionUpdates, NoSessionUpdates, SessionUpdateSink,
        ToolCallUpdate,
    },
    transport::{ServerConnection, ToolPage, TransportConnector, TransportError},
};
pub use session::guard::{
    BeginGeneration, GenerationLease, Refusal, SessionConcurrencyGuard, SessionError,
};
pub use tracking::tracker::{ToolCallProgress, ToolCallTracker, TrackerError};
pub use use_cases::aggregator::{
    Aggregator, AggregatorError, ToolCallContext, ToolCallOutcome, ToolCallReport,
};
pub use use_cases::prompt_turn::{
    GenerationContext, GenerationError, PromptOutcome, PromptTurnUseCase,
};
