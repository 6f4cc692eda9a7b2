//! Interactive permission prompt for tool calls.
//!
//! When a call has no remembered decision, the user sees:
//!
//! ```text
//! ───────────────────────────────────────────────
//!   Permission required: A__echo
//! ───────────────────────────────────────────────
//!   Server:    A
//!   Tool:      echo
//!   Arguments: {"text":"hi"}
//!
//!   1) Allow once     2) Always allow
//!   3) Reject once    4) Always reject
//!
//! permission [1-4]>
//! ```
//!
//! # Answers
//!
//! | Answer | Aliases | Option |
//! |--------|---------|--------|
//! | `1` | `y`, `yes` | Allow once |
//! | `2` | `a`, `always` | Always allow |
//! | `3` | `n`, `no` | Reject once |
//! | `4` | `never` | Always reject |
//!
//! End of input withdraws the request.

use async_trait::async_trait;
use colored::Colorize;
use conductor_application::{ArbiterError, PermissionArbiter, PermissionRequest};
use conductor_domain::{PermissionOption, PermissionOutcome, truncate};
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

type Input = Box<dyn BufRead + Send>;

/// Terminal-based [`PermissionArbiter`].
///
/// Prompts are serialized: a second request waits until the first one
/// has been answered.
pub struct ConsolePermissionArbiter {
    input: Arc<Mutex<Input>>,
}

impl ConsolePermissionArbiter {
    pub fn new() -> Self {
        Self::with_input(Box::new(io::BufReader::new(io::stdin())))
    }

    /// Read answers from another source.
    pub fn with_input(input: Input) -> Self {
        Self {
            input: Arc::new(Mutex::new(input)),
        }
    }

    fn display_prompt(request: &PermissionRequest) {
        let rule = "───────────────────────────────────────────────".yellow();
        println!();
        println!("{}", rule);
        println!(
            "  {} {}",
            "Permission required:".yellow().bold(),
            request.title.bold()
        );
        println!("{}", rule);
        println!("  {}    {}", "Server:".cyan(), request.server_name);
        println!("  {}      {}", "Tool:".cyan(), request.tool_name);
        println!(
            "  {} {}",
            "Arguments:".cyan(),
            truncate(&request.arguments.to_string(), 200).dimmed()
        );
        println!();
        for (i, option) in request.options.iter().enumerate() {
            let label = format!("{}) {}", i + 1, option.label());
            let label = match option {
                PermissionOption::AllowOnce | PermissionOption::AllowAlways => label.green(),
                PermissionOption::RejectOnce | PermissionOption::RejectAlways => label.red(),
            };
            println!("  {}", label);
        }
        println!();
    }
}

impl Default for ConsolePermissionArbiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Map one line of input to an offered option.
pub fn parse_answer(input: &str, options: &[PermissionOption]) -> Option<PermissionOption> {
    let answer = input.trim().to_lowercase();
    if let Ok(n) = answer.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| options.get(i)).copied();
    }
    let option = match answer.as_str() {
        "y" | "yes" | "allow" => PermissionOption::AllowOnce,
        "a" | "always" => PermissionOption::AllowAlways,
        "n" | "no" | "reject" => PermissionOption::RejectOnce,
        "never" => PermissionOption::RejectAlways,
        _ => return None,
    };
    options.contains(&option).then_some(option)
}

fn read_answer(
    input: &mut Input,
    request: &PermissionRequest,
) -> Result<PermissionOutcome, ArbiterError> {
    ConsolePermissionArbiter::display_prompt(request);

    loop {
        print!("{} ", "permission [1-4]>".magenta().bold());
        io::stdout()
            .flush()
            .map_err(|e| ArbiterError::Io(format!("Failed to flush stdout: {}", e)))?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .map_err(|e| ArbiterError::Io(format!("Failed to read input: {}", e)))?;
        if read == 0 {
            println!();
            return Ok(PermissionOutcome::Cancelled);
        }

        match parse_answer(&line, &request.options) {
            Some(option) => return Ok(PermissionOutcome::Selected(option)),
            None if line.trim().is_empty() => continue,
            None => {
                println!("{} Unknown answer: {}", "!".yellow(), line.trim().red());
            }
        }
    }
}

#[async_trait]
impl PermissionArbiter for ConsolePermissionArbiter {
    async fn request_permission(
        &self,
        request: PermissionRequest,
    ) -> Result<PermissionOutcome, ArbiterError> {
        let input = Arc::clone(&self.input);
        tokio::task::spawn_blocking(move || {
            let mut input = input
                .lock()
                .map_err(|_| ArbiterError::Unavailable("prompt lock poisoned".into()))?;
            read_answer(&mut input, &request)
        })
        .await
        .map_err(|e| ArbiterError::Unavailable(format!("prompt task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::{SessionId, ToolCallId, ToolKind};
    use std::io::Cursor;

    fn request() -> PermissionRequest {
        PermissionRequest {
            session_id: SessionId::new("s1"),
            tool_call_id: ToolCallId::new("call_1"),
            server_name: "A".into(),
            tool_name: "echo".into(),
            title: "A__echo".into(),
            kind: ToolKind::Other,
            arguments: serde_json::json!({"text": "hi"}),
            options: PermissionOption::ALL.to_vec(),
        }
    }

    fn arbiter(input: &str) -> ConsolePermissionArbiter {
        ConsolePermissionArbiter::with_input(Box::new(Cursor::new(input.to_string())))
    }

    #[test]
    fn test_parse_answer() {
        let all = PermissionOption::ALL;
        assert_eq!(parse_answer("1", &all), Some(PermissionOption::AllowOnce));
        assert_eq!(parse_answer(" 4\n", &all), Some(PermissionOption::RejectAlways));
        assert_eq!(parse_answer("Always", &all), Some(PermissionOption::AllowAlways));
        assert_eq!(parse_answer("n", &all), Some(PermissionOption::RejectOnce));
        assert_eq!(parse_answer("0", &all), None);
        assert_eq!(parse_answer("5", &all), None);
        assert_eq!(parse_answer("maybe", &all), None);
    }

    #[test]
    fn test_parse_answer_respects_offered_options() {
        let offered = [PermissionOption::AllowOnce, PermissionOption::RejectOnce];
        assert_eq!(parse_answer("2", &offered), Some(PermissionOption::RejectOnce));
        assert_eq!(parse_answer("always", &offered), None);
    }

    #[tokio::test]
    async fn test_skips_invalid_lines() {
        let outcome = arbiter("\nmaybe\n2\n")
            .request_permission(request())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            PermissionOutcome::Selected(PermissionOption::AllowAlways)
        );
    }

    #[tokio::test]
    async fn test_end_of_input_cancels() {
        let outcome = arbiter("").request_permission(request()).await.unwrap();
        assert_eq!(outcome, PermissionOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_prompts_are_answered_in_turn() {
        let arbiter = arbiter("1\n3\n");
        let first = arbiter.request_permission(request()).await.unwrap();
        let second = arbiter.request_permission(request()).await.unwrap();
        assert!(first.allows());
        assert!(!second.allows());
    }
}
