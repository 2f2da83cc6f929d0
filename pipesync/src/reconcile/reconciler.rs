//! Workflow manifest to operator status reconciliation.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::deployment::workflow_deployment_update;
use super::manifest::Workflow;
use super::phase::node_update;
use super::run::{project_run, RunStatusApi};
use crate::core::{DeploymentUpdate, NodeUpdate, PipelineRun, Scope, Status};
use crate::errors::PipesyncError;
use crate::store::Store;

/// Derives per-operator updates from a workflow manifest.
///
/// Before the orchestrator has produced a node map, every root task of the
/// DAG is reported `Pending`. Afterwards each node whose display name is an
/// operator id yields one update; other nodes are plumbing and are skipped.
/// The result depends on the manifest alone.
#[must_use]
pub fn reconcile(workflow: &Workflow) -> Vec<NodeUpdate> {
    let Some(nodes) = workflow.nodes() else {
        return root_tasks(workflow)
            .into_iter()
            .map(|id| NodeUpdate::status_only(id, Status::Pending))
            .collect();
    };

    nodes
        .values()
        .filter_map(|node| {
            let node_id = Uuid::parse_str(&node.display_name).ok()?;
            Some(node_update(node_id, node.phase.as_deref(), node.message.as_deref()))
        })
        .collect()
}

/// Operator ids of DAG tasks that wait for no other operator.
///
/// Dependencies on plumbing tasks (names that are not operator ids) do not
/// count.
fn root_tasks(workflow: &Workflow) -> Vec<Uuid> {
    workflow
        .dag_tasks()
        .iter()
        .filter(|task| task.dependencies.iter().all(|dep| Uuid::parse_str(dep).is_err()))
        .filter_map(|task| Uuid::parse_str(&task.name).ok())
        .collect()
}

/// Everything one workflow manifest implies for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// The experiment or deployment the workflow runs.
    pub scope: Option<Scope>,
    /// Status for operators of the scope that the manifest does not mention.
    pub baseline: Option<Status>,
    /// Node-derived updates; they take precedence over the baseline.
    pub nodes: Vec<NodeUpdate>,
    /// Update for the deployment row, for deployment workflows.
    pub deployment: Option<DeploymentUpdate>,
}

/// Builds the full plan for a workflow manifest.
///
/// While the workflow is `Pending` or `Running`, operators without a node
/// are `Pending`. Finished workflows leave them alone so operators never
/// fall back to `Unset`.
#[must_use]
pub fn plan(workflow: &Workflow) -> ReconcilePlan {
    let scope = workflow.scope();
    let baseline = match (scope, workflow.phase()) {
        (Some(_), Some("Pending" | "Running")) => Some(Status::Pending),
        _ => None,
    };
    ReconcilePlan {
        scope,
        baseline,
        nodes: reconcile(workflow),
        deployment: workflow_deployment_update(workflow),
    }
}

/// Counts of rows a reconciliation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Operator rows whose status or message changed.
    pub operators_changed: usize,
    /// Whether the deployment row changed.
    pub deployment_changed: bool,
}

/// Applies workflow-derived status to a store.
///
/// Writes touch only `status`, `status_message` and the deployment status
/// columns, and only when the value differs, so replaying a manifest is a
/// no-op.
pub struct StatusReconciler<S: Store> {
    store: Arc<S>,
}

impl<S: Store> StatusReconciler<S> {
    /// Creates a reconciler.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Writes a plan: the baseline and node updates in one batch, then the
    /// deployment row.
    pub async fn apply(&self, plan: &ReconcilePlan) -> Result<ReconcileReport, PipesyncError> {
        let mut updates = Vec::with_capacity(plan.nodes.len());
        if let (Some(scope), Some(baseline)) = (plan.scope, &plan.baseline) {
            let listed: HashSet<Uuid> = plan.nodes.iter().map(|u| u.node_id).collect();
            updates.extend(
                self.store
                    .operators_in(scope)
                    .await?
                    .into_iter()
                    .filter(|op| !listed.contains(&op.id))
                    .map(|op| NodeUpdate::status_only(op.id, baseline.clone())),
            );
        }
        updates.extend(plan.nodes.iter().cloned());

        let operators_changed = self.store.apply_node_updates(&updates).await?;
        let deployment_changed = match &plan.deployment {
            Some(update) => self.store.apply_deployment_update(update).await?,
            None => false,
        };

        let report = ReconcileReport {
            operators_changed,
            deployment_changed,
        };
        debug!(
            scope = ?plan.scope,
            updates = updates.len(),
            operators_changed,
            deployment_changed,
            "Reconciled"
        );
        Ok(report)
    }

    /// Plans and applies a workflow manifest.
    pub async fn reconcile_workflow(&self, workflow: &Workflow) -> Result<ReconcileReport, PipesyncError> {
        self.apply(&plan(workflow)).await
    }

    /// Fetches one run, converges the store to it and returns its projection.
    pub async fn reconcile_run<A: RunStatusApi + ?Sized>(
        &self,
        api: &A,
        run_id: &str,
    ) -> Result<PipelineRun, PipesyncError> {
        let manifest = api.get_run(run_id).await?;
        let report = self.reconcile_workflow(&manifest.workflow).await?;
        info!(run_id, operators_changed = report.operators_changed, "Run reconciled");
        Ok(project_run(&manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MessagePatch, Operator};
    use crate::reconcile::run::{MockRunStatusApi, RunManifest};
    use crate::store::InMemoryStore;
    use crate::testing::WorkflowFixture;
    use pretty_assertions::assert_eq;

    fn parse(fixture: WorkflowFixture) -> Workflow {
        Workflow::from_value(&fixture.build()).unwrap()
    }

    #[test]
    fn test_missing_node_map_marks_roots_pending() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let workflow = parse(
            WorkflowFixture::new(Scope::Experiment(Uuid::new_v4()))
                .with_task("vol-shared", &[])
                .with_task(&a.to_string(), &["vol-shared"])
                .with_task(&b.to_string(), &[a.to_string().as_str()])
                .with_task(&c.to_string(), &[]),
        );

        assert_eq!(
            reconcile(&workflow),
            vec![
                NodeUpdate::status_only(a, Status::Pending),
                NodeUpdate::status_only(c, Status::Pending),
            ]
        );
    }

    #[test]
    fn test_plumbing_nodes_are_skipped() {
        let a = Uuid::new_v4();
        let workflow = parse(
            WorkflowFixture::new(Scope::Experiment(Uuid::new_v4()))
                .with_node("vol-shared", "Succeeded", None)
                .with_node(&a.to_string(), "Skipped", Some("ContainerCreating")),
        );

        assert_eq!(
            reconcile(&workflow),
            vec![NodeUpdate {
                node_id: a,
                status: Status::Succeeded,
                status_message: MessagePatch::Keep,
            }]
        );
    }

    #[test]
    fn test_plan_baseline_only_while_running() {
        let scope = Scope::Experiment(Uuid::new_v4());
        let running = plan(&parse(WorkflowFixture::new(scope).with_phase("Running")));
        assert_eq!(running.baseline, Some(Status::Pending));
        assert_eq!(running.scope, Some(scope));
        assert!(running.deployment.is_none());

        let finished = plan(&parse(WorkflowFixture::new(scope).with_phase("Succeeded")));
        assert_eq!(finished.baseline, None);
    }

    #[tokio::test]
    async fn test_apply_baseline_then_nodes() {
        let store = Arc::new(InMemoryStore::new());
        let scope = Scope::Experiment(Uuid::new_v4());
        let a = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4());
        let b = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4()).with_dependencies([a.id]);
        store.upsert_operators(vec![a.clone(), b.clone()]).await.unwrap();

        let reconciler = StatusReconciler::new(store.clone());
        let workflow = parse(
            WorkflowFixture::new(scope)
                .with_phase("Running")
                .with_node(&a.id.to_string(), "Running", None),
        );
        let report = reconciler.reconcile_workflow(&workflow).await.unwrap();

        assert_eq!(report.operators_changed, 2);
        assert_eq!(store.get_operator(a.id).await.unwrap().unwrap().status, Status::Running);
        assert_eq!(store.get_operator(b.id).await.unwrap().unwrap().status, Status::Pending);

        let again = reconciler.reconcile_workflow(&workflow).await.unwrap();
        assert_eq!(again, ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_apply_updates_deployment_row() {
        let store = Arc::new(InMemoryStore::new());
        let id = Uuid::new_v4();
        store.insert_deployment(id);

        let reconciler = StatusReconciler::new(store.clone());
        let workflow = parse(
            WorkflowFixture::new(Scope::Deployment(id))
                .with_phase("Succeeded")
                .with_started_at("2024-05-01T08:30:00Z"),
        );
        let report = reconciler.reconcile_workflow(&workflow).await.unwrap();

        assert!(report.deployment_changed);
        let row = store.deployment(id).unwrap();
        assert_eq!(row.status, Status::Succeeded);
        assert!(row.deployed_at.is_some());
    }

    #[tokio::test]
    async fn test_reconcile_run_polls_and_projects() {
        let store = Arc::new(InMemoryStore::new());
        let scope = Scope::Experiment(Uuid::new_v4());
        let op = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4());
        store.upsert_operators(vec![op.clone()]).await.unwrap();

        let value = WorkflowFixture::new(scope)
            .with_phase("Failed")
            .with_task(&op.id.to_string(), &[])
            .with_node(&op.id.to_string(), "Error", Some("OOMKilled"))
            .build();
        let mut api = MockRunStatusApi::new();
        api.expect_get_run()
            .withf(|run_id| run_id == "run-1")
            .times(1)
            .returning(move |_| {
                Ok(RunManifest {
                    run_id: "run-1".into(),
                    created_at: None,
                    workflow: Workflow::from_value(&value).unwrap(),
                })
            });

        let reconciler = StatusReconciler::new(store.clone());
        let run = reconciler.reconcile_run(&api, "run-1").await.unwrap();

        assert_eq!(run.node_statuses[&op.id.to_string()].status, Status::Failed);
        let stored = store.get_operator(op.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Failed);
        assert_eq!(stored.status_message.as_deref(), Some("OOMKilled"));
    }
}
