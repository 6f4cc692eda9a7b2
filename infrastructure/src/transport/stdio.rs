//! Stdio transport: spawn the server and speak line JSON-RPC over its pipes.

use super::line::LineChannel;
use conductor_application::TransportError;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Spawn `command` and connect a [`LineChannel`] to its stdin/stdout.
///
/// Stderr lines are forwarded to `debug!` logs.
pub fn spawn(
    server_name: &str,
    command: &str,
    args: &[String],
    env: &HashMap<String, String>,
) -> Result<LineChannel, TransportError> {
    debug!(server = %server_name, command, ?args, "Spawning server process");

    let mut cmd = Command::new(command);
    cmd.args(args)
        .envs(env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Linux: request kernel to send SIGTERM to child when parent dies.
    #[cfg(target_os = "linux")]
    unsafe {
        cmd.pre_exec(|| {
            libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
            Ok(())
        });
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| TransportError::Spawn(format!("{command}: {e}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| TransportError::Spawn("Failed to capture stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TransportError::Spawn("Failed to capture stdout".into()))?;

    if let Some(stderr) = child.stderr.take() {
        let server = server_name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(server = %server, "stderr: {}", line);
            }
        });
    }

    Ok(LineChannel::new(server_name, stdout, stdin, Some(child)))
}
