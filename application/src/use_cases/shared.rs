//! Shared utilities for use cases.
//!
//! Cancellation checks used at the suspension points of the generation
//! and tool execution path.

use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Marker error: the operation observed a cancelled token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Check if cancellation has been requested.
pub fn check_cancelled(token: &CancellationToken) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        return Err(Cancelled);
    }
    Ok(())
}

/// Await `fut` unless `token` is cancelled first.
///
/// Cancellation wins when both are ready.
pub async fn run_cancellable<F: Future>(
    token: &CancellationToken,
    fut: F,
) -> Result<F::Output, Cancelled> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled),
        output = fut => Ok(output),
    }
}
