//! Permission prompts.

mod console_arbiter;

pub use console_arbiter::{ConsolePermissionArbiter, parse_answer};
