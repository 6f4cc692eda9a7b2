//! Progress display for tool calls.

mod console_updates;

pub use console_updates::ConsoleSessionUpdates;
