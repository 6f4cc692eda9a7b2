//! Aggregator use case
//!
//! Presents every registered server's tools as one flat list and routes
//! calls to the owning server through the single lifecycle path:
//!
//! ```text
//! resolve name ──(unknown / ambiguous)──> AggregatorError::ToolNotFound
//!      ↓
//! Tracker::create (pending)
//!      ↓
//! PermissionGate::check ──(denied / cancelled)──> Tracker::complete (failed)
//!      ↓
//! Tracker::update (in_progress)
//!      ↓
//! ConnectionRegistry::invoke (raced with cancellation, bounded by deadline)
//!      ↓
//! Tracker::complete (completed / failed)
//! ```
//!
//! Every outcome after resolution, including denials and cancellations,
//! flows through the tracker so the client sees a complete lifecycle.

use crate::config::ExecutionParams;
use crate::connection::registry::ConnectionRegistry;
use crate::permission::gate::PermissionGate;
use crate::tracking::tracker::{ToolCallProgress, ToolCallTracker};
use conductor_domain::{
    Resolution, SessionId, ToolCall, ToolCallId, ToolCallStatus, ToolCatalog, ToolDescriptor,
    ToolError, ToolResult,
};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregatorError {
    #[error("Tool not found: {name}{}", format_candidates(.candidates))]
    ToolNotFound {
        name: String,
        /// Namespaced names for an ambiguous bare name, suggestions otherwise
        candidates: Vec<String>,
        ambiguous: bool,
    },
}

fn format_candidates(candidates: &[String]) -> String {
    if candidates.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {})", candidates.join(", "))
    }
}

/// Per-call context supplied by the caller.
#[derive(Debug, Clone)]
pub struct ToolCallContext {
    pub session_id: SessionId,
    pub cancel: CancellationToken,
    /// Overrides the configured call timeout
    pub deadline: Option<Duration>,
}

impl ToolCallContext {
    pub fn new(session_id: SessionId, cancel: CancellationToken) -> Self {
        Self {
            session_id,
            cancel,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Terminal outcome of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallOutcome {
    /// The server answered; `is_error` may still be set by the tool
    Completed(ToolResult),
    /// No answer could be obtained
    Failed(ToolError),
    /// The permission gate refused the call
    Denied,
    /// The session cancelled the call
    Cancelled,
}

/// What `call_tool` returns for a resolved name.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallReport {
    pub call_id: ToolCallId,
    pub server_name: String,
    pub tool_name: String,
    pub outcome: ToolCallOutcome,
}

/// How often a server missing from the catalog is asked again for its tools.
const DEFAULT_LISTING_RETRY: Duration = Duration::from_secs(5);

/// A built catalog and what it was built from.
struct CatalogState {
    catalog: Arc<ToolCatalog>,
    /// Registry tools epoch read before listing
    epoch: u64,
    /// Servers whose tools made it into the catalog
    listed: Vec<String>,
    built_at: Instant,
}

/// Multi-server tool router.
pub struct Aggregator {
    registry: Arc<ConnectionRegistry>,
    tracker: Arc<ToolCallTracker>,
    gate: Arc<PermissionGate>,
    params: ExecutionParams,
    listing_retry: Duration,
    catalog: RwLock<Option<CatalogState>>,
}

impl Aggregator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        tracker: Arc<ToolCallTracker>,
        gate: Arc<PermissionGate>,
    ) -> Self {
        Self {
            registry,
            tracker,
            gate,
            params: ExecutionParams::default(),
            listing_retry: DEFAULT_LISTING_RETRY,
            catalog: RwLock::new(None),
        }
    }

    pub fn with_params(mut self, params: ExecutionParams) -> Self {
        self.params = params;
        self
    }

    /// Minimum wait before retrying a server whose listing failed.
    pub fn with_listing_retry(mut self, interval: Duration) -> Self {
        self.listing_retry = interval;
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<ToolCallTracker> {
        &self.tracker
    }

    /// Merge every reachable server's tools into a fresh catalog.
    ///
    /// Servers that fail to list are skipped with a warning.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.rebuild().await.tools().to_vec()
    }

    async fn rebuild(&self) -> Arc<ToolCatalog> {
        let epoch = self.registry.tools_epoch();
        let names = self.registry.server_names();
        let lists = futures::future::join_all(
            names
                .iter()
                .map(|name| self.registry.list_server_tools(name)),
        )
        .await;

        let mut per_server = Vec::with_capacity(names.len());
        for (name, result) in names.into_iter().zip(lists) {
            match result {
                Ok(tools) => per_server.push((name, tools)),
                Err(e) => warn!(server = %name, error = %e, "Skipping server in tool list"),
            }
        }

        let listed = per_server.iter().map(|(name, _)| name.clone()).collect();
        let catalog = Arc::new(ToolCatalog::from_servers(per_server));
        debug!(tools = catalog.len(), epoch, "Tool catalog rebuilt");
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Some(CatalogState {
            catalog: catalog.clone(),
            epoch,
            listed,
            built_at: Instant::now(),
        });
        catalog
    }

    /// Drop every cached tool list and rebuild the catalog.
    pub async fn refresh(&self) -> Vec<ToolDescriptor> {
        for name in self.registry.server_names() {
            if let Err(e) = self.registry.invalidate_tools(&name) {
                warn!(server = %name, error = %e, "Failed to invalidate tool list");
            }
        }
        self.list_tools().await
    }

    /// Current catalog, rebuilt when it no longer reflects the registry.
    ///
    /// The catalog is stale when a listed server announced a tool list
    /// change, a server was registered or invalidated since it was built,
    /// or a registered server is missing from it and the retry interval
    /// has passed.
    pub async fn catalog(&self) -> Arc<ToolCatalog> {
        let listed = self
            .catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|state| state.listed.clone())
            .unwrap_or_default();
        for name in &listed {
            if let Err(e) = self.registry.take_tool_list_changed(name).await {
                warn!(server = %name, error = %e, "Failed to poll tool list change");
            }
        }

        let epoch = self.registry.tools_epoch();
        let names = self.registry.server_names();
        let current = {
            let guard = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
            guard.as_ref().and_then(|state| {
                let missing = names.iter().any(|n| !state.listed.contains(n));
                let retry_due = missing && state.built_at.elapsed() >= self.listing_retry;
                (state.epoch == epoch && !retry_due).then(|| state.catalog.clone())
            })
        };
        match current {
            Some(catalog) => catalog,
            None => self.rebuild().await,
        }
    }

    /// Resolve and run one tool call.
    ///
    /// Unknown or ambiguous names fail before any tracker entry is created
    /// and without invoking any server.
    pub async fn call_tool(
        &self,
        ctx: &ToolCallContext,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallReport, AggregatorError> {
        let catalog = self.catalog().await;
        let descriptor = match catalog.resolve(name) {
            Resolution::Found(descriptor) => descriptor.clone(),
            Resolution::Ambiguous(candidates) => {
                return Err(AggregatorError::ToolNotFound {
                    name: name.to_string(),
                    candidates,
                    ambiguous: true,
                });
            }
            Resolution::NotFound(candidates) => {
                return Err(AggregatorError::ToolNotFound {
                    name: name.to_string(),
                    candidates,
                    ambiguous: false,
                });
            }
        };

        let call = ToolCall::new(
            ctx.session_id.clone(),
            &descriptor.owner_server,
            &descriptor.name,
            arguments,
        )
        .with_title(&descriptor.exposed_name);
        let outcome = self.execute(ctx, call.clone()).await;

        Ok(ToolCallReport {
            call_id: call.id,
            server_name: descriptor.owner_server,
            tool_name: descriptor.name,
            outcome,
        })
    }

    async fn execute(&self, ctx: &ToolCallContext, call: ToolCall) -> ToolCallOutcome {
        let id = self.tracker.create(call.clone());

        let decision = self.gate.check(&call, &ctx.cancel).await;
        if !decision.allow {
            if decision.is_cancelled() {
                self.finish(&id, vec![], Some(ToolError::cancelled()));
                return ToolCallOutcome::Cancelled;
            }
            debug!(call_id = %id, source = ?decision.source, "Tool call denied");
            self.finish(
                &id,
                vec![],
                Some(ToolError::permission_denied(&call.title)),
            );
            return ToolCallOutcome::Denied;
        }

        if let Err(e) = self
            .tracker
            .update(&id, ToolCallProgress::status(ToolCallStatus::InProgress))
        {
            warn!(call_id = %id, error = %e, "Failed to mark tool call in progress");
        }

        let deadline = ctx.deadline.unwrap_or(self.params.call_timeout);
        let invoke = self.registry.invoke(
            &call.server_name,
            &call.tool_name,
            call.arguments.clone(),
            Some(deadline),
        );
        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => None,
            result = invoke => Some(result),
        };

        match result {
            None => {
                debug!(call_id = %id, "Tool call cancelled while in progress");
                self.finish(&id, vec![], Some(ToolError::cancelled()));
                ToolCallOutcome::Cancelled
            }
            Some(Ok(result)) => {
                let error = result
                    .is_error
                    .then(|| ToolError::execution_failed(result.text_content()));
                self.finish(&id, result.content.clone(), error);
                ToolCallOutcome::Completed(result)
            }
            Some(Err(e)) => {
                warn!(call_id = %id, server = %call.server_name, error = %e, "Tool call failed");
                let error = e.to_tool_error();
                self.finish(&id, vec![], Some(error.clone()));
                ToolCallOutcome::Failed(error)
            }
        }
    }

    fn finish(
        &self,
        id: &ToolCallId,
        content: Vec<conductor_domain::ToolContent>,
        error: Option<ToolError>,
    ) {
        if let Err(e) = self.tracker.complete(id, content, error) {
            warn!(call_id = %id, error = %e, "Failed to complete tool call");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectPolicy;
    use crate::ports::permission_arbiter::AutoApproveArbiter;
    use crate::ports::permission_store::{InMemoryPermissionStore, PermissionStore};
    use crate::testing::{MockConnector, MockServer, RecordingSink, ScriptedArbiter};
    use crate::ports::transport::TransportError;
    use conductor_domain::{
        PermissionDecision, PermissionKey, PermissionOption, PermissionOutcome, SESSION_TERMINATED_CODE,
        ServerConfig,
    };
    use serde_json::json;

    struct Fixture {
        aggregator: Aggregator,
        sink: Arc<RecordingSink>,
        store: Arc<InMemoryPermissionStore>,
        a: Arc<MockServer>,
        b: Arc<MockServer>,
    }

    fn fixture_with(arbiter: Arc<dyn crate::ports::permission_arbiter::PermissionArbiter>) -> Fixture {
        let a = MockServer::new("A", &["echo", "shout"]);
        let b = MockServer::new("B", &["echo"]);
        let registry = ConnectionRegistry::new(MockConnector::new(vec![a.clone(), b.clone()]))
            .with_policy(ReconnectPolicy::immediate(2));
        registry.register(ServerConfig::stdio("A", "mock", vec![])).unwrap();
        registry.register(ServerConfig::stdio("B", "mock", vec![])).unwrap();

        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(InMemoryPermissionStore::new());
        let aggregator = Aggregator::new(
            Arc::new(registry),
            Arc::new(ToolCallTracker::new(sink.clone())),
            Arc::new(PermissionGate::new(store.clone(), arbiter)),
        );
        Fixture {
            aggregator,
            sink,
            store,
            a,
            b,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(AutoApproveArbiter))
    }

    fn ctx() -> ToolCallContext {
        ToolCallContext::new(SessionId::new("s1"), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_list_tools_namespacing() {
        let f = fixture();
        let mut exposed: Vec<_> = f
            .aggregator
            .list_tools()
            .await
            .into_iter()
            .map(|t| t.exposed_name)
            .collect();
        exposed.sort();
        assert_eq!(exposed, vec!["A__echo", "B__echo", "shout"]);
    }

    #[tokio::test]
    async fn test_routing_by_namespaced_and_unique_bare_name() {
        let f = fixture();

        let report = f.aggregator.call_tool(&ctx(), "shout", json!({})).await.unwrap();
        assert_eq!(report.server_name, "A");
        assert!(matches!(report.outcome, ToolCallOutcome::Completed(_)));

        let report = f
            .aggregator
            .call_tool(&ctx(), "B__echo", json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(report.server_name, "B");
        assert_eq!(f.b.calls(), 1);
        assert_eq!(f.a.calls(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_bare_name_is_not_found() {
        let f = fixture();
        let err = f.aggregator.call_tool(&ctx(), "echo", json!({})).await.unwrap_err();
        let AggregatorError::ToolNotFound {
            candidates,
            ambiguous,
            ..
        } = err;
        assert!(ambiguous);
        assert_eq!(candidates, vec!["A__echo", "B__echo"]);
        assert_eq!(f.a.calls() + f.b.calls(), 0);
        assert_eq!(f.sink.len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_name_creates_no_tracker_entry() {
        let f = fixture();
        let err = f.aggregator.call_tool(&ctx(), "shuot", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Tool not found: shuot (did you mean: shout)");
        assert_eq!(f.sink.len(), 0);
        assert_eq!(f.aggregator.tracker().active_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_call_lifecycle() {
        let f = fixture();
        let report = f
            .aggregator
            .call_tool(&ctx(), "A__echo", json!({"text": "hi"}))
            .await
            .unwrap();

        let ToolCallOutcome::Completed(result) = report.outcome else {
            panic!("expected completion");
        };
        assert_eq!(result.text_content(), r#"A/echo: {"text":"hi"}"#);
        assert_eq!(
            f.sink.statuses(),
            vec![
                ToolCallStatus::Pending,
                ToolCallStatus::InProgress,
                ToolCallStatus::Completed
            ]
        );
        let updates = f.sink.updates.lock().unwrap();
        assert!(updates.iter().all(|u| u.tool_call_id == report.call_id));
        assert_eq!(updates[0].title, "A__echo");
    }

    #[tokio::test]
    async fn test_denied_call_completes_failed() {
        let f = fixture_with(ScriptedArbiter::new(vec![Ok(PermissionOutcome::Selected(
            PermissionOption::RejectOnce,
        ))]));
        let report = f.aggregator.call_tool(&ctx(), "shout", json!({})).await.unwrap();

        assert_eq!(report.outcome, ToolCallOutcome::Denied);
        assert_eq!(
            f.sink.statuses(),
            vec![ToolCallStatus::Pending, ToolCallStatus::Failed]
        );
        assert_eq!(f.a.calls(), 0);
    }

    #[tokio::test]
    async fn test_remembered_allow_bypasses_arbiter() {
        let arbiter = ScriptedArbiter::new(vec![]);
        let f = fixture_with(arbiter.clone());
        f.store
            .set(&PermissionKey::new("A", "shout"), PermissionDecision::AllowAlways)
            .unwrap();

        let report = f.aggregator.call_tool(&ctx(), "shout", json!({})).await.unwrap();
        assert!(matches!(report.outcome, ToolCallOutcome::Completed(_)));
        assert_eq!(arbiter.prompts(), 0);
    }

    #[tokio::test]
    async fn test_server_failure_completes_failed() {
        let f = fixture();
        f.a.fail_next_call(TransportError::Rpc {
            code: -32602,
            message: "Invalid params".into(),
        });
        let report = f.aggregator.call_tool(&ctx(), "shout", json!({})).await.unwrap();

        let ToolCallOutcome::Failed(error) = report.outcome else {
            panic!("expected failure");
        };
        assert_eq!(error.code, "EXECUTION_FAILED");
        assert_eq!(f.sink.statuses().last(), Some(&ToolCallStatus::Failed));
    }

    #[tokio::test]
    async fn test_session_reset_is_invisible_to_caller() {
        let f = fixture();
        f.aggregator.call_tool(&ctx(), "shout", json!({})).await.unwrap();
        f.a.fail_next_call(TransportError::Rpc {
            code: SESSION_TERMINATED_CODE,
            message: "Session terminated".into(),
        });

        let report = f.aggregator.call_tool(&ctx(), "shout", json!({})).await.unwrap();
        assert!(matches!(report.outcome, ToolCallOutcome::Completed(_)));
        let handle = f.aggregator.registry().status("A").unwrap();
        assert_eq!(handle.session_cookie.unwrap().as_str(), "session-2");
    }

    #[tokio::test]
    async fn test_cancel_while_in_progress() {
        let f = fixture();
        f.a.set_call_delay(Duration::from_secs(5));
        let ctx = ctx();
        f.aggregator.list_tools().await;

        let cancel = ctx.cancel.clone();
        let canceller = async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        };
        let (report, ()) = tokio::join!(
            f.aggregator.call_tool(&ctx, "shout", json!({})),
            canceller
        );

        assert_eq!(report.unwrap().outcome, ToolCallOutcome::Cancelled);
        assert_eq!(
            f.sink.statuses(),
            vec![
                ToolCallStatus::Pending,
                ToolCallStatus::InProgress,
                ToolCallStatus::Failed
            ]
        );
        let updates = f.sink.updates.lock().unwrap();
        assert_eq!(updates[2].error.as_ref().unwrap().code, "CANCELLED");
    }

    #[tokio::test]
    async fn test_deadline_expiry_fails_call() {
        let f = fixture();
        f.a.set_call_delay(Duration::from_millis(200));
        let ctx = ctx().with_deadline(Duration::from_millis(20));

        let report = f.aggregator.call_tool(&ctx, "shout", json!({})).await.unwrap();
        let ToolCallOutcome::Failed(error) = report.outcome else {
            panic!("expected failure");
        };
        assert_eq!(error.code, "TIMEOUT");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_skipped_in_listing() {
        let f = fixture();
        for _ in 0..3 {
            f.b.fail_next_connect(TransportError::Io("Connection refused".into()));
        }
        let tools = f.aggregator.list_tools().await;
        let exposed: Vec<_> = tools.iter().map(|t| t.exposed_name.as_str()).collect();
        // With B gone, "echo" is unique again
        assert!(exposed.contains(&"echo"));
        assert!(exposed.contains(&"shout"));
        assert_eq!(tools.len(), 2);
    }

    fn aggregator_over(servers: Vec<Arc<MockServer>>, registered: &[&str]) -> Aggregator {
        let registry = ConnectionRegistry::new(MockConnector::new(servers))
            .with_policy(ReconnectPolicy::immediate(2));
        for name in registered {
            registry.register(ServerConfig::stdio(*name, "mock", vec![])).unwrap();
        }
        Aggregator::new(
            Arc::new(registry),
            Arc::new(ToolCallTracker::new(Arc::new(RecordingSink::default()))),
            Arc::new(PermissionGate::new(
                Arc::new(InMemoryPermissionStore::new()),
                Arc::new(AutoApproveArbiter),
            )),
        )
    }

    fn exposed_names(tools: Vec<ToolDescriptor>) -> Vec<String> {
        let mut names: Vec<_> = tools.into_iter().map(|t| t.exposed_name).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_announced_tool_is_callable_without_refresh() {
        let echo = MockServer::new("echo", &["say"]);
        let aggregator = aggregator_over(vec![echo.clone()], &["echo"]);
        let report = aggregator.call_tool(&ctx(), "say", json!({})).await.unwrap();
        assert_eq!(report.server_name, "echo");

        echo.tools.lock().unwrap().push("yell".into());
        echo.announce_list_changed();

        let report = aggregator.call_tool(&ctx(), "yell", json!({})).await.unwrap();
        assert_eq!(report.server_name, "echo");
        assert_eq!(report.tool_name, "yell");
        assert!(matches!(report.outcome, ToolCallOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_second_server_with_same_tool_makes_bare_name_ambiguous() {
        let echo = MockServer::new("echo", &["say"]);
        let shout = MockServer::new("shout", &["say"]);
        let aggregator = aggregator_over(vec![echo.clone(), shout.clone()], &["echo"]);

        assert_eq!(exposed_names(aggregator.list_tools().await), vec!["say"]);
        let report = aggregator.call_tool(&ctx(), "say", json!({})).await.unwrap();
        assert_eq!(report.server_name, "echo");

        aggregator
            .registry()
            .register(ServerConfig::stdio("shout", "mock", vec![]))
            .unwrap();

        let err = aggregator.call_tool(&ctx(), "say", json!({})).await.unwrap_err();
        let AggregatorError::ToolNotFound {
            candidates,
            ambiguous,
            ..
        } = err;
        assert!(ambiguous);
        assert_eq!(candidates, vec!["echo__say", "shout__say"]);
        assert_eq!(echo.calls(), 1);
        assert_eq!(shout.calls(), 0);

        assert_eq!(
            exposed_names(aggregator.list_tools().await),
            vec!["echo__say", "shout__say"]
        );
        let report = aggregator
            .call_tool(&ctx(), "shout__say", json!({}))
            .await
            .unwrap();
        assert_eq!(report.server_name, "shout");
        assert_eq!(shout.calls(), 1);
    }

    #[tokio::test]
    async fn test_server_that_failed_listing_is_retried() {
        let a = MockServer::new("A", &["shout"]);
        let b = MockServer::new("B", &["hum"]);
        for _ in 0..3 {
            b.fail_next_connect(TransportError::Io("Connection refused".into()));
        }
        let aggregator = aggregator_over(vec![a, b.clone()], &["A", "B"])
            .with_listing_retry(Duration::ZERO);

        assert_eq!(exposed_names(aggregator.list_tools().await), vec!["shout"]);

        let report = aggregator.call_tool(&ctx(), "hum", json!({})).await.unwrap();
        assert_eq!(report.server_name, "B");
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_server_not_retried_before_interval() {
        let a = MockServer::new("A", &["shout"]);
        let b = MockServer::new("B", &["hum"]);
        for _ in 0..3 {
            b.fail_next_connect(TransportError::Io("Connection refused".into()));
        }
        let aggregator = aggregator_over(vec![a, b.clone()], &["A", "B"])
            .with_listing_retry(Duration::from_secs(3600));

        aggregator.list_tools().await;
        let connects = b.connects();
        let err = aggregator.call_tool(&ctx(), "hum", json!({})).await.unwrap_err();
        assert!(matches!(err, AggregatorError::ToolNotFound { ambiguous: false, .. }));
        assert_eq!(b.connects(), connects);
    }

    #[tokio::test]
    async fn test_parallel_calls_tracked_separately() {
        let f = fixture();
        f.aggregator.list_tools().await;
        let ctx = ctx();
        let (x, y) = tokio::join!(
            f.aggregator.call_tool(&ctx, "A__echo", json!({"n": 1})),
            f.aggregator.call_tool(&ctx, "B__echo", json!({"n": 2})),
        );
        assert_ne!(x.unwrap().call_id, y.unwrap().call_id);
        assert_eq!(f.sink.len(), 6);
        assert_eq!(f.aggregator.tracker().active_count(), 0);
    }
}
