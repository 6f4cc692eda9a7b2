//! Logging infrastructure: structured session update logging.
//!
//! Provides [`JsonlSessionUpdateLog`], a JSONL file writer that implements
//! the [`SessionUpdateSink`](conductor_application::SessionUpdateSink) port.

mod jsonl_updates;

pub use jsonl_updates::JsonlSessionUpdateLog;
