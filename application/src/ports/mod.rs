//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure and presentation
//! adapters must implement.

pub mod permission_arbiter;
pub mod permission_store;
pub mod session_update;
pub mod transport;
