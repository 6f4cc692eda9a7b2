//! Tool subdomain: descriptors, catalog, naming and the call lifecycle.
//!
//! - [`naming`] - `<server>__<tool>` namespacing and name suggestions
//! - [`entities`] - [`ToolDescriptor`](entities::ToolDescriptor) and [`ToolCatalog`](entities::ToolCatalog)
//! - [`call`] - [`ToolCall`](call::ToolCall) state machine
//! - [`value_objects`] - results and errors

pub mod call;
pub mod entities;
pub mod naming;
pub mod value_objects;
