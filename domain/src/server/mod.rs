//! Backend tool server domain.
//!
//! - [`entities::ServerConfig`] - how to reach a server and how to treat its connection
//! - [`entities::ServerHandle`] - observable connection state of one server
//! - [`error_class::classify_server_error`] - fatal / transient / other classification

pub mod entities;
pub mod error_class;
