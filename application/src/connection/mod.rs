//! Backend server connections.
//!
//! - [`registry::ConnectionRegistry`] - one handle per server, reconnects, tool list cache

pub mod registry;
