//! The persistence agent.
//!
//! Runs one supervised watch loop per kind, all sharing one cancellation
//! token. When any loop stops on its own, the token is cancelled so the
//! others stop at their next reconnect, and the failure is raised to the
//! [`AlertSink`].

mod poll;
mod supervisor;

pub use poll::{is_transient, sync_run};
pub use supervisor::WatchLoop;

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{error, info};

use crate::cancellation::CancellationToken;
use crate::config::AgentConfig;
use crate::errors::{PipesyncError, WatchError};
use crate::observability::{Alert, AlertReason, AlertSink};
use crate::reconcile::{SeldonHandler, WorkflowHandler};
use crate::store::Store;
use crate::watch::WatchApi;

/// Keeps the store in sync with the orchestrator.
pub struct PersistenceAgent {
    loops: Vec<WatchLoop>,
    token: CancellationToken,
    alerts: Arc<dyn AlertSink>,
}

impl PersistenceAgent {
    /// Creates an agent with no loops.
    #[must_use]
    pub fn new(token: CancellationToken, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            loops: Vec::new(),
            token,
            alerts,
        }
    }

    /// The standard agent: workflows reconciled into operator and deployment
    /// rows, Seldon deployments into deployment rows.
    #[must_use]
    pub fn for_store<S: Store + 'static>(
        api: Arc<dyn WatchApi>,
        store: Arc<S>,
        config: &AgentConfig,
        token: CancellationToken,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let workflows = WatchLoop::new(
            api.clone(),
            config.workflow_kind(),
            Arc::new(WorkflowHandler::new(store.clone())),
        )
        .with_timeout(config.workflows.timeout())
        .with_retry(config.workflows.retry.clone());

        let seldon = WatchLoop::new(api, config.seldon_kind(), Arc::new(SeldonHandler::new(store)))
            .with_timeout(config.seldon.timeout())
            .with_retry(config.seldon.retry.clone());

        Self::new(token, alerts).with_loop(workflows).with_loop(seldon)
    }

    /// Adds a loop.
    #[must_use]
    pub fn with_loop(mut self, watch: WatchLoop) -> Self {
        self.loops.push(watch);
        self
    }

    /// The token stopping every loop.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Runs all loops until the token is cancelled.
    ///
    /// Returns the first loop failure, after every loop has stopped.
    pub async fn run(self) -> Result<(), PipesyncError> {
        let Self { loops, token, alerts } = self;
        token.on_cancel(|reason| info!(reason, "Persistence agent stopping"));

        let mut active = FuturesUnordered::new();
        for watch in loops {
            let resource = watch.kind().to_string();
            info!(kind = %resource, "Starting watch loop");
            let handle = tokio::spawn(watch.supervise(token.clone()));
            active.push(async move { (resource, handle.await) });
        }

        let mut first_error: Option<WatchError> = None;
        while let Some((resource, joined)) = active.next().await {
            let failure = match joined {
                Ok(Ok(())) => {
                    info!(kind = %resource, "Watch loop stopped");
                    continue;
                }
                Ok(Err(failure)) => failure,
                Err(join_error) => supervisor::LoopFailure {
                    reason: AlertReason::Fatal,
                    error: WatchError::fatal(resource.clone(), join_error.to_string()),
                    attempts: 0,
                },
            };

            error!(kind = %resource, error = %failure.error, "Watch loop failed, stopping agent");
            token.cancel(format!("{resource}: {}", failure.error));
            alerts
                .raise(Alert::new(
                    resource,
                    failure.reason,
                    failure.error.to_string(),
                    failure.attempts,
                ))
                .await;
            first_error.get_or_insert(failure.error);
        }

        first_error.map_or(Ok(()), |e| Err(e.into()))
    }
}

impl std::fmt::Debug for PersistenceAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAgent")
            .field("loops", &self.loops)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::CollectingAlertSink;
    use crate::retry::{JitterStrategy, RetryConfig};
    use crate::testing::{RecordingHandler, ScriptedWatchApi};
    use crate::watch::ResourceKind;

    fn slow_retry() -> RetryConfig {
        RetryConfig::new()
            .with_base_delay_ms(60_000)
            .with_max_delay_ms(60_000)
            .with_jitter(JitterStrategy::None)
    }

    #[tokio::test]
    async fn test_fatal_loop_stops_sibling_and_alerts() {
        let token = CancellationToken::new();
        let alerts = Arc::new(CollectingAlertSink::new());

        let workflows = WatchLoop::new(
            Arc::new(ScriptedWatchApi::new().with_list(Err(WatchError::transient("workflows", "503")))),
            ResourceKind::workflows("anonymous"),
            Arc::new(RecordingHandler::new()),
        )
        .with_retry(slow_retry());
        let seldon = WatchLoop::new(
            Arc::new(ScriptedWatchApi::new().with_list(Err(WatchError::fatal("seldondeployments", "403: forbidden")))),
            ResourceKind::seldon_deployments("anonymous"),
            Arc::new(RecordingHandler::new()),
        );

        let agent = PersistenceAgent::new(token.clone(), alerts.clone())
            .with_loop(workflows)
            .with_loop(seldon);
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), agent.run())
            .await
            .unwrap();

        assert!(matches!(result, Err(PipesyncError::Watch(WatchError::Fatal { .. }))));
        assert!(token.is_cancelled());
        assert!(token.reason().is_some_and(|r| r.contains("403: forbidden")));
        let raised = alerts.alerts();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].reason, AlertReason::Fatal);
        assert_eq!(raised[0].resource, ResourceKind::seldon_deployments("anonymous").to_string());
    }

    #[tokio::test]
    async fn test_cancelled_agent_stops_cleanly() {
        let token = CancellationToken::new();
        token.cancel("shutdown");
        let alerts = Arc::new(CollectingAlertSink::new());
        let api: Arc<dyn WatchApi> = Arc::new(ScriptedWatchApi::new());
        let store = Arc::new(crate::store::InMemoryStore::new());

        let agent = PersistenceAgent::for_store(api, store, &AgentConfig::default(), token, alerts.clone());
        assert!(agent.run().await.is_ok());
        assert!(alerts.is_empty());
    }
}
