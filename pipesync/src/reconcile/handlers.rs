//! Watch handlers that feed orchestrator events into the store.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::deployment::seldon_update;
use super::manifest::{SeldonDeployment, Workflow};
use super::reconciler::StatusReconciler;
use crate::errors::PipesyncError;
use crate::store::Store;
use crate::watch::{object_name, WatchEvent, WatchHandler};

/// Reconciles every workflow event.
///
/// Listed workflows are reconciled too, so a relist converges the store to
/// the orchestrator's current state.
pub struct WorkflowHandler<S: Store> {
    reconciler: StatusReconciler<S>,
}

impl<S: Store> WorkflowHandler<S> {
    /// Creates a handler writing to `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self {
            reconciler: StatusReconciler::new(store),
        }
    }
}

#[async_trait]
impl<S: Store> WatchHandler for WorkflowHandler<S> {
    async fn on_event(&self, event: &WatchEvent) -> Result<(), PipesyncError> {
        let workflow = Workflow::from_value(&event.object)?;
        self.reconciler.reconcile_workflow(&workflow).await?;
        Ok(())
    }

    async fn on_listed(&self, items: &[Value]) -> Result<(), PipesyncError> {
        for item in items {
            match Workflow::from_value(item) {
                Ok(workflow) => {
                    self.reconciler.reconcile_workflow(&workflow).await?;
                }
                Err(e) => warn!(name = object_name(item).unwrap_or_default(), error = %e, "Skipping listed workflow"),
            }
        }
        Ok(())
    }
}

/// Copies Seldon rollout state onto deployment rows.
pub struct SeldonHandler<S: Store> {
    store: Arc<S>,
}

impl<S: Store> SeldonHandler<S> {
    /// Creates a handler writing to `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn apply(&self, sdep: &SeldonDeployment) -> Result<(), PipesyncError> {
        if let Some(update) = seldon_update(sdep) {
            let changed = self.store.apply_deployment_update(&update).await?;
            debug!(deployment_id = %update.deployment_id, status = %update.status, changed, "Deployment status");
        }
        Ok(())
    }
}

#[async_trait]
impl<S: Store> WatchHandler for SeldonHandler<S> {
    async fn on_event(&self, event: &WatchEvent) -> Result<(), PipesyncError> {
        self.apply(&SeldonDeployment::from_value(&event.object)?).await
    }

    async fn on_listed(&self, items: &[Value]) -> Result<(), PipesyncError> {
        for item in items {
            match SeldonDeployment::from_value(item) {
                Ok(sdep) => self.apply(&sdep).await?,
                Err(e) => warn!(name = object_name(item).unwrap_or_default(), error = %e, "Skipping listed deployment"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Operator, Scope, Status};
    use crate::store::InMemoryStore;
    use crate::testing::{seldon_deployment, WorkflowFixture};
    use crate::watch::WatchEventType;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_workflow_event_updates_operators() {
        let store = Arc::new(InMemoryStore::new());
        let scope = Scope::Experiment(Uuid::new_v4());
        let op = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4());
        store.upsert_operators(vec![op.clone()]).await.unwrap();

        let handler = WorkflowHandler::new(store.clone());
        let event = WorkflowFixture::new(scope)
            .with_phase("Running")
            .with_node(&op.id.to_string(), "Succeeded", None)
            .event(WatchEventType::Modified);
        handler.on_event(&event).await.unwrap();

        assert_eq!(store.get_operator(op.id).await.unwrap().unwrap().status, Status::Succeeded);
    }

    #[tokio::test]
    async fn test_malformed_workflow_is_manifest_error() {
        let handler = WorkflowHandler::new(Arc::new(InMemoryStore::new()));
        let event = WatchEvent::new(WatchEventType::Added, serde_json::json!({"metadata": 1}));
        assert!(matches!(handler.on_event(&event).await, Err(PipesyncError::Manifest(_))));
    }

    #[tokio::test]
    async fn test_listed_workflows_skip_malformed_items() {
        let store = Arc::new(InMemoryStore::new());
        let scope = Scope::Experiment(Uuid::new_v4());
        let op = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4());
        store.upsert_operators(vec![op.clone()]).await.unwrap();

        let handler = WorkflowHandler::new(store.clone());
        let good = WorkflowFixture::new(scope)
            .with_phase("Failed")
            .with_node(&op.id.to_string(), "Failed", Some("boom"))
            .build();
        handler
            .on_listed(&[serde_json::json!({"metadata": 1}), good])
            .await
            .unwrap();

        let stored = store.get_operator(op.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Failed);
        assert_eq!(stored.status_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_seldon_event_updates_deployment() {
        let store = Arc::new(InMemoryStore::new());
        let id = Uuid::new_v4();
        store.insert_deployment(id);

        let handler = SeldonHandler::new(store.clone());
        let event = WatchEvent::new(WatchEventType::Modified, seldon_deployment(id, Some("Available")));
        handler.on_event(&event).await.unwrap();
        assert_eq!(store.deployment(id).unwrap().status, Status::Succeeded);

        let pending = WatchEvent::new(WatchEventType::Modified, seldon_deployment(id, None));
        handler.on_event(&pending).await.unwrap();
        assert_eq!(store.deployment(id).unwrap().status, Status::Succeeded);
    }
}
