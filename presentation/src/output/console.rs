//! Console output formatter for catalog, status and call results

use colored::Colorize;
use conductor_application::{ToolCallOutcome, ToolCallReport};
use conductor_domain::{
    ConnectionState, PermissionDecision, PermissionRecord, ServerHandle, ToolDescriptor, truncate,
};
use serde_json::json;

/// Width of the description column in the tool table
const DESCRIPTION_WIDTH: usize = 60;

/// Formats results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Tool table: exposed name, owner, description.
    pub fn format_tools(tools: &[ToolDescriptor]) -> String {
        if tools.is_empty() {
            return format!("{}\n", "No tools available.".dimmed());
        }

        let name_width = tools
            .iter()
            .map(|t| t.exposed_name.len())
            .max()
            .unwrap_or(0);

        let mut output = Self::header(&format!("Tools ({})", tools.len()));
        for tool in tools {
            let description = tool
                .description
                .as_deref()
                .map(|d| truncate(d.lines().next().unwrap_or_default(), DESCRIPTION_WIDTH))
                .unwrap_or_default();
            output.push_str(&format!(
                "  {}  {}  {}\n",
                format!("{:<width$}", tool.exposed_name, width = name_width).bold(),
                format!("[{}]", tool.owner_server).cyan(),
                description.dimmed(),
            ));
        }
        output
    }

    /// One line per server with its connection state.
    pub fn format_status(handles: &[ServerHandle]) -> String {
        if handles.is_empty() {
            return format!("{}\n", "No servers configured.".dimmed());
        }

        let mut output = Self::header("Servers");
        for handle in handles {
            let state = match handle.connection_state {
                ConnectionState::Connected => handle.connection_state.to_string().green(),
                ConnectionState::Connecting => handle.connection_state.to_string().yellow(),
                ConnectionState::Degraded => handle.connection_state.to_string().yellow(),
                ConnectionState::Disconnected => handle.connection_state.to_string().red(),
            };

            let mut line = format!(
                "  {} ({}) {}",
                handle.server_name.bold(),
                handle.transport_kind,
                state
            );
            if let Some(count) = handle.tool_count {
                line.push_str(&format!(", {} tools", count));
            }
            if handle.reconnects > 0 {
                line.push_str(&format!(", {} reconnects", handle.reconnects));
            }
            if let Some(cookie) = &handle.session_cookie {
                line.push_str(&format!(", session {}", cookie.as_str().dimmed()));
            }
            output.push_str(&line);
            output.push('\n');

            if let Some(error) = &handle.last_error {
                output.push_str(&format!("    └─ {}\n", truncate(error, 100).red()));
            }
        }
        output
    }

    /// Outcome of one call.
    pub fn format_report(report: &ToolCallReport) -> String {
        let label = format!("{}/{}", report.server_name, report.tool_name);
        match &report.outcome {
            ToolCallOutcome::Completed(result) if result.is_error => format!(
                "{} {}\n{}\n",
                "✗".red(),
                label.bold(),
                result.text_content()
            ),
            ToolCallOutcome::Completed(result) => format!(
                "{} {}\n{}\n",
                "✓".green(),
                label.bold(),
                result.text_content()
            ),
            ToolCallOutcome::Failed(error) => format!(
                "{} {} {}: {}\n",
                "✗".red(),
                label.bold(),
                error.code.red(),
                error.message
            ),
            ToolCallOutcome::Denied => {
                format!("{} {} {}\n", "✗".red(), label.bold(), "permission denied".red())
            }
            ToolCallOutcome::Cancelled => {
                format!("{} {} {}\n", "-".yellow(), label.bold(), "cancelled".yellow())
            }
        }
    }

    /// Remembered permission decisions.
    pub fn format_permissions(records: &[PermissionRecord]) -> String {
        if records.is_empty() {
            return format!("{}\n", "No remembered decisions.".dimmed());
        }

        let mut output = Self::header("Remembered decisions");
        for record in records {
            let decision = match record.decision {
                PermissionDecision::AllowAlways => record.decision.as_str().green(),
                PermissionDecision::RejectAlways => record.decision.as_str().red(),
            };
            output.push_str(&format!(
                "  {}/{}  {}\n",
                record.server_name, record.tool_name, decision
            ));
        }
        output
    }

    pub fn tools_json(tools: &[ToolDescriptor]) -> String {
        Self::to_json(&tools)
    }

    pub fn status_json(handles: &[ServerHandle]) -> String {
        Self::to_json(&handles)
    }

    pub fn permissions_json(records: &[PermissionRecord]) -> String {
        Self::to_json(&records)
    }

    pub fn report_json(report: &ToolCallReport) -> String {
        let mut value = json!({
            "toolCallId": report.call_id,
            "server": report.server_name,
            "tool": report.tool_name,
        });
        let (status, detail) = match &report.outcome {
            ToolCallOutcome::Completed(result) => ("completed", json!(result)),
            ToolCallOutcome::Failed(error) => ("failed", json!({ "error": error })),
            ToolCallOutcome::Denied => ("denied", json!(null)),
            ToolCallOutcome::Cancelled => ("cancelled", json!(null)),
        };
        value["status"] = json!(status);
        if !detail.is_null() {
            value["result"] = detail;
        }
        Self::to_json(&value)
    }

    fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    fn header(title: &str) -> String {
        format!("{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::{
        ServerConfig, SessionCookie, ToolCallId, ToolError, ToolResult,
    };

    fn plain() {
        colored::control::set_override(false);
    }

    fn report(outcome: ToolCallOutcome) -> ToolCallReport {
        ToolCallReport {
            call_id: ToolCallId::new("call_1"),
            server_name: "A".into(),
            tool_name: "echo".into(),
            outcome,
        }
    }

    #[test]
    fn test_format_tools_aligns_names() {
        plain();
        let mut echo = ToolDescriptor::new("A", "echo").with_description("Echo text\nmore");
        echo.exposed_name = "A__echo".into();
        let mut shout = ToolDescriptor::new("B", "shout");
        shout.exposed_name = "shout".into();

        let output = ConsoleFormatter::format_tools(&[echo, shout]);
        assert!(output.contains("Tools (2)"));
        assert!(output.contains("  A__echo  [A]  Echo text"));
        assert!(output.contains("  shout    [B]"));
        assert!(!output.contains("more"));
    }

    #[test]
    fn test_format_status() {
        plain();
        let mut handle = ServerHandle::new(&ServerConfig::stdio("A", "a", vec![]));
        handle.connection_state = ConnectionState::Connected;
        handle.tool_count = Some(2);
        handle.session_cookie = Some(SessionCookie::new("session-1"));

        let mut down = ServerHandle::new(&ServerConfig::stdio("B", "b", vec![]));
        down.last_error = Some("connection refused".into());

        let output = ConsoleFormatter::format_status(&[handle, down]);
        assert!(output.contains("A (stdio) connected, 2 tools, session session-1"));
        assert!(output.contains("B (stdio) disconnected"));
        assert!(output.contains("└─ connection refused"));
    }

    #[test]
    fn test_format_report_variants() {
        plain();
        let done = ConsoleFormatter::format_report(&report(ToolCallOutcome::Completed(
            ToolResult::text("hi"),
        )));
        assert!(done.starts_with("✓ A/echo"));
        assert!(done.contains("hi"));

        let failed = ConsoleFormatter::format_report(&report(ToolCallOutcome::Failed(
            ToolError::timeout("A__echo"),
        )));
        assert!(failed.contains("TIMEOUT"));

        let denied = ConsoleFormatter::format_report(&report(ToolCallOutcome::Denied));
        assert!(denied.contains("permission denied"));
    }

    #[test]
    fn test_report_json() {
        let json: serde_json::Value = serde_json::from_str(&ConsoleFormatter::report_json(
            &report(ToolCallOutcome::Failed(ToolError::cancelled())),
        ))
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["result"]["error"]["code"], "CANCELLED");
        assert_eq!(json["toolCallId"], "call_1");
    }

    #[test]
    fn test_format_permissions_empty() {
        plain();
        assert!(ConsoleFormatter::format_permissions(&[]).contains("No remembered decisions"));
    }
}
