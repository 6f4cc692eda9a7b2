//! Presentation layer for conductor
//!
//! This crate contains CLI definitions, output formatters, the console
//! permission prompt and the console progress printer.

pub mod cli;
pub mod output;
pub mod permission;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{Cli, Command, OutputFormat, PermissionsCommand};
pub use output::console::ConsoleFormatter;
pub use permission::ConsolePermissionArbiter;
pub use progress::ConsoleSessionUpdates;
