//! Run lookups and their read-only projection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::manifest::{parse_timestamp, Template, Workflow};
use super::phase::node_status;
use crate::core::{NodeStatus, PipelineRun, Status};
use crate::errors::PipesyncError;

const VOLUME_TASK_PREFIX: &str = "vol-";
const TASK_INPUT_PREFIX: &str = "vol-task-";
const TASK_INPUT_SUFFIX: &str = "-name";
const PARAMETER_ENV_PREFIX: &str = "PARAMETER_";

/// A run as reported by the pipelines API.
#[derive(Debug, Clone)]
pub struct RunManifest {
    /// Run id.
    pub run_id: String,
    /// When the run was created.
    pub created_at: Option<DateTime<Utc>>,
    /// The workflow executing the run.
    pub workflow: Workflow,
}

/// Looks up runs on the orchestrator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunStatusApi: Send + Sync {
    /// Fetches a run with its workflow manifest.
    async fn get_run(&self, run_id: &str) -> Result<RunManifest, PipesyncError>;
}

/// Projects a run onto the platform's view of it.
///
/// Every DAG task except shared-volume plumbing gets an entry. Tasks without
/// a node yet are `Pending`, or `Unset` once the workflow has finished.
#[must_use]
pub fn project_run(manifest: &RunManifest) -> PipelineRun {
    let workflow = &manifest.workflow;
    let default_status = match workflow.phase() {
        Some("Succeeded" | "Failed") => Status::Unset,
        _ => Status::Pending,
    };

    let mut node_statuses: BTreeMap<String, NodeStatus> = workflow
        .dag_tasks()
        .iter()
        .filter(|task| !task.name.starts_with(VOLUME_TASK_PREFIX))
        .map(|task| (task.name.clone(), NodeStatus::new(default_status.clone())))
        .collect();

    for node in workflow.nodes().into_iter().flat_map(BTreeMap::values) {
        let Some(entry) = node_statuses.get_mut(&node.display_name) else {
            continue;
        };
        entry.status = node_status(node.phase.as_deref(), node.message.as_deref());
        entry.message.clone_from(&node.message);
        entry.started_at = node.started_at.as_deref().and_then(parse_timestamp);
    }

    for template in &workflow.spec.templates {
        let Some(entry) = node_statuses.get_mut(&template.name) else {
            continue;
        };
        entry.task_id = task_id(template);
        entry.parameters = parameters(template);
    }

    PipelineRun {
        run_id: manifest.run_id.clone(),
        scope_id: workflow.scope().map(|scope| scope.id()),
        started_at: manifest.created_at.or_else(|| workflow.started_at()),
        node_statuses,
    }
}

/// The task id, encoded in a `vol-task-<task id>-name` input.
fn task_id(template: &Template) -> Option<String> {
    template
        .inputs
        .as_ref()?
        .parameters
        .iter()
        .find_map(|p| p.name.strip_prefix(TASK_INPUT_PREFIX)?.strip_suffix(TASK_INPUT_SUFFIX))
        .map(str::to_string)
}

/// Parameter values passed as `PARAMETER_<name>` container env vars.
///
/// Values are JSON; values that do not parse are kept as strings.
fn parameters(template: &Template) -> serde_json::Map<String, serde_json::Value> {
    let Some(container) = &template.container else {
        return serde_json::Map::new();
    };
    container
        .env
        .iter()
        .filter_map(|var| {
            let name = var.name.strip_prefix(PARAMETER_ENV_PREFIX)?;
            let value = var.value.as_deref().map_or(serde_json::Value::Null, |raw| {
                serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
            });
            Some((name.to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Scope;
    use crate::testing::WorkflowFixture;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uuid::Uuid;

    fn manifest(fixture: WorkflowFixture) -> RunManifest {
        RunManifest {
            run_id: "run-1".into(),
            created_at: None,
            workflow: Workflow::from_value(&fixture.build()).unwrap(),
        }
    }

    #[test]
    fn test_projection_defaults_and_overrides() {
        let scope_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4().to_string(), Uuid::new_v4().to_string());
        let run = project_run(&manifest(
            WorkflowFixture::new(Scope::Experiment(scope_id))
                .with_phase("Running")
                .with_task("vol-shared", &[])
                .with_task(&a, &["vol-shared"])
                .with_task(&b, &[a.as_str()])
                .with_node(&a, "Running", Some("terminated"))
                .with_started_at("2024-01-02T03:04:05Z"),
        ));

        assert_eq!(run.scope_id, Some(scope_id));
        assert!(run.started_at.is_some());
        assert_eq!(run.node_statuses.keys().cloned().collect::<Vec<_>>(), {
            let mut keys = vec![a.clone(), b.clone()];
            keys.sort();
            keys
        });
        assert_eq!(run.node_statuses[&a].status, Status::Terminated);
        assert_eq!(run.node_statuses[&b].status, Status::Pending);
    }

    #[test]
    fn test_finished_run_defaults_to_unset() {
        let a = Uuid::new_v4().to_string();
        let run = project_run(&manifest(
            WorkflowFixture::new(Scope::Experiment(Uuid::new_v4()))
                .with_phase("Succeeded")
                .with_task(&a, &[]),
        ));
        assert_eq!(run.node_statuses[&a].status, Status::Unset);
    }

    #[test]
    fn test_task_id_and_parameters() {
        let a = Uuid::new_v4().to_string();
        let task = Uuid::new_v4().to_string();
        let run = project_run(&manifest(
            WorkflowFixture::new(Scope::Experiment(Uuid::new_v4()))
                .with_task(&a, &[])
                .with_task_id(&a, &task)
                .with_parameter(&a, "alpha", "0.5")
                .with_parameter(&a, "features", r#"["x", "y"]"#)
                .with_parameter(&a, "label", "plain text"),
        ));

        let node = &run.node_statuses[&a];
        assert_eq!(node.task_id.as_deref(), Some(task.as_str()));
        assert_eq!(node.parameters["alpha"], json!(0.5));
        assert_eq!(node.parameters["features"], json!(["x", "y"]));
        assert_eq!(node.parameters["label"], json!("plain text"));
    }
}
