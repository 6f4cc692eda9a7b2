//! Application-level configuration.
//!
//! - [`ExecutionParams`] - call deadlines and permission policy
//! - [`ReconnectPolicy`] - bounded reconnect attempts with backoff

pub mod execution_params;
pub mod reconnect_policy;

pub use execution_params::ExecutionParams;
pub use reconnect_policy::ReconnectPolicy;
