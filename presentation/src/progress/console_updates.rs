//! Tool call progress printed to the terminal

use colored::Colorize;
use conductor_application::{SessionUpdateSink, ToolCallUpdate};
use conductor_domain::{ToolCallStatus, truncate};
use std::io::{self, Write};

/// Prints one line per tool call transition to stderr.
///
/// Stdout is left to command output so `-o json` stays machine-readable.
pub struct ConsoleSessionUpdates {
    show_pending: bool,
}

impl ConsoleSessionUpdates {
    pub fn new() -> Self {
        Self { show_pending: true }
    }

    /// Only print transitions past `pending`.
    pub fn quiet() -> Self {
        Self {
            show_pending: false,
        }
    }

    /// The line printed for an update, or `None` when it is suppressed.
    pub fn render(&self, update: &ToolCallUpdate) -> Option<String> {
        let title = update.title.bold();
        let line = match update.status {
            ToolCallStatus::Pending if !self.show_pending => return None,
            ToolCallStatus::Pending => format!("{} {} {}", "○".dimmed(), title, "pending".dimmed()),
            ToolCallStatus::InProgress => match &update.progress {
                Some(message) => format!("{} {} {}", "◐".cyan(), title, message.dimmed()),
                None => format!("{} {} {}", "◐".cyan(), title, "running".cyan()),
            },
            ToolCallStatus::Completed => format!("{} {} {}", "●".green(), title, "done".green()),
            ToolCallStatus::Failed => {
                let reason = update
                    .error
                    .as_ref()
                    .map(|e| format!("{}: {}", e.code, truncate(&e.message, 80)))
                    .unwrap_or_else(|| "failed".to_string());
                format!("{} {} {}", "✗".red(), title, reason.red())
            }
        };
        Some(line)
    }
}

impl Default for ConsoleSessionUpdates {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionUpdateSink for ConsoleSessionUpdates {
    fn notify(&self, update: ToolCallUpdate) {
        if let Some(line) = self.render(&update) {
            let _ = writeln!(io::stderr(), "{}", line);
        }
    }
}
