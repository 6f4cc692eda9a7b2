//! Permission gating.
//!
//! - [`gate::PermissionGate`] - remembered decisions first, then the arbiter

pub mod gate;
