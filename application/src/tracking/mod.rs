//! Tool call lifecycle tracking.
//!
//! - [`tracker::ToolCallTracker`] - owns in-flight calls and emits one notification per transition

pub mod tracker;
