//! Prompt turn use case
//!
//! Wraps one generation in the session concurrency guard. The generation
//! function gets a [`GenerationContext`] whose every suspension point
//! (tool dispatch, streamed chunk, explicit checkpoint) observes the
//! session's cancellation token.
//!
//! The lease is ended exactly once, after the generation function has
//! returned or been abandoned.

use super::aggregator::{
    Aggregator, AggregatorError, ToolCallContext, ToolCallOutcome, ToolCallReport,
};
use super::shared::{Cancelled, check_cancelled, run_cancellable};
use crate::session::guard::{BeginGeneration, Refusal, SessionConcurrencyGuard};
use conductor_domain::SessionId;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Error returned by a generation function.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation cancelled")]
    Cancelled,

    #[error("Generation failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Tool(#[from] AggregatorError),
}

impl From<Cancelled> for GenerationError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// How a prompt turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptOutcome<T> {
    Completed(T),
    Failed(String),
    Cancelled,
    /// The turn never started
    Refused(Refusal),
}

impl<T> PromptOutcome<T> {
    /// Stop reason as reported to the client.
    pub fn stop_reason(&self) -> &'static str {
        match self {
            Self::Completed(_) => "end_turn",
            Self::Failed(_) => "error",
            Self::Cancelled => "cancelled",
            Self::Refused(_) => "refused",
        }
    }
}

/// Handle given to the generation function for one turn.
#[derive(Clone)]
pub struct GenerationContext {
    session_id: SessionId,
    token: CancellationToken,
    aggregator: Arc<Aggregator>,
}

impl GenerationContext {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail fast if the turn was cancelled.
    pub fn checkpoint(&self) -> Result<(), GenerationError> {
        Ok(check_cancelled(&self.token)?)
    }

    /// Await one streamed chunk unless the turn is cancelled first.
    pub async fn next_chunk<F: Future>(&self, fut: F) -> Result<F::Output, GenerationError> {
        Ok(run_cancellable(&self.token, fut).await?)
    }

    /// Run one tool call. A cancelled call ends the generation.
    ///
    /// Denials and failures are returned as reports so the model can see
    /// them.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallReport, GenerationError> {
        self.checkpoint()?;
        let ctx = ToolCallContext::new(self.session_id.clone(), self.token.clone());
        let report = self.aggregator.call_tool(&ctx, name, arguments).await?;
        if report.outcome == ToolCallOutcome::Cancelled {
            return Err(GenerationError::Cancelled);
        }
        Ok(report)
    }

    /// Dispatch several calls in parallel.
    ///
    /// Each result is independent; cancellation is checked before any
    /// call is dispatched.
    pub async fn call_tools(
        &self,
        calls: Vec<(String, Value)>,
    ) -> Result<Vec<Result<ToolCallReport, GenerationError>>, GenerationError> {
        self.checkpoint()?;
        let futures = calls
            .into_iter()
            .map(|(name, arguments)| async move { self.call_tool(&name, arguments).await });
        let results = futures::future::join_all(futures).await;
        self.checkpoint()?;
        Ok(results)
    }
}

/// Runs prompt turns under single-flight control.
pub struct PromptTurnUseCase {
    guard: Arc<SessionConcurrencyGuard>,
    aggregator: Arc<Aggregator>,
}

impl PromptTurnUseCase {
    pub fn new(guard: Arc<SessionConcurrencyGuard>, aggregator: Arc<Aggregator>) -> Self {
        Self { guard, aggregator }
    }

    pub fn guard(&self) -> &Arc<SessionConcurrencyGuard> {
        &self.guard
    }

    /// Run `generate` as the session's only active generation.
    ///
    /// Returns `Refused` without calling `generate` if another generation
    /// is active or the session is unknown.
    pub async fn run<T, F, Fut>(&self, session_id: &SessionId, generate: F) -> PromptOutcome<T>
    where
        F: FnOnce(GenerationContext) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let lease = match self.guard.try_begin_generation(session_id) {
            BeginGeneration::Accepted(lease) => lease,
            BeginGeneration::Refused(refusal) => {
                debug!(session = %session_id, ?refusal, "Prompt refused");
                return PromptOutcome::Refused(refusal);
            }
        };

        let ctx = GenerationContext {
            session_id: session_id.clone(),
            token: lease.token().clone(),
            aggregator: self.aggregator.clone(),
        };
        let result = generate(ctx).await;

        let outcome = if lease.is_cancelled() {
            PromptOutcome::Cancelled
        } else {
            match result {
                Ok(value) => PromptOutcome::Completed(value),
                Err(GenerationError::Cancelled) => PromptOutcome::Cancelled,
                Err(e) => {
                    warn!(session = %session_id, error = %e, "Generation failed");
                    PromptOutcome::Failed(e.to_string())
                }
            }
        };

        if !lease.end() {
            debug!(session = %session_id, "Generation already ended elsewhere");
        }
        info!(session = %session_id, stop_reason = outcome.stop_reason(), "Prompt turn finished");
        outcome
    }
}
