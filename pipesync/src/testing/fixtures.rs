//! Orchestrator object fixtures.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::core::Scope;
use crate::watch::{WatchEvent, WatchEventType};

const NAME_SUFFIX: &str = "x7k2p";
const DAG_TEMPLATE: &str = "main";

#[derive(Debug, Default, Clone)]
struct TaskTemplate {
    name: String,
    inputs: Vec<Value>,
    env: Vec<Value>,
}

/// Builder for workflow manifests as the orchestrator reports them.
///
/// The workflow is named after its scope the way the compiler names it, so
/// `Workflow::scope` recovers the experiment or deployment id.
#[derive(Debug, Clone)]
pub struct WorkflowFixture {
    name: String,
    resource_version: Option<String>,
    phase: Option<String>,
    started_at: Option<String>,
    tasks: Vec<Value>,
    templates: Vec<TaskTemplate>,
    nodes: Option<Map<String, Value>>,
}

impl WorkflowFixture {
    /// Creates a workflow for `scope` with no tasks and no status.
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self {
            name: format!("{scope}-{NAME_SUFFIX}"),
            resource_version: None,
            phase: None,
            started_at: None,
            tasks: Vec::new(),
            templates: Vec::new(),
            nodes: None,
        }
    }

    /// Sets the workflow phase.
    #[must_use]
    pub fn with_phase(mut self, phase: &str) -> Self {
        self.phase = Some(phase.to_string());
        self
    }

    /// Sets the workflow start time.
    #[must_use]
    pub fn with_started_at(mut self, started_at: &str) -> Self {
        self.started_at = Some(started_at.to_string());
        self
    }

    /// Sets `metadata.resourceVersion`.
    #[must_use]
    pub fn with_resource_version(mut self, rv: &str) -> Self {
        self.resource_version = Some(rv.to_string());
        self
    }

    /// Adds a DAG task.
    #[must_use]
    pub fn with_task(mut self, name: &str, dependencies: &[&str]) -> Self {
        let mut task = json!({"name": name, "template": name});
        if !dependencies.is_empty() {
            task["dependencies"] = json!(dependencies);
        }
        self.tasks.push(task);
        self
    }

    /// Adds a node to the status map, creating the map on first use.
    #[must_use]
    pub fn with_node(mut self, display_name: &str, phase: &str, message: Option<&str>) -> Self {
        let nodes = self.nodes.get_or_insert_with(Map::new);
        let id = format!("{}-{}", self.name, nodes.len());
        let mut node = json!({"id": id, "displayName": display_name, "phase": phase});
        if let Some(message) = message {
            node["message"] = json!(message);
        }
        nodes.insert(id, node);
        self
    }

    /// Records the task id on a task's template as a `vol-task-<id>-name` input.
    #[must_use]
    pub fn with_task_id(mut self, task_name: &str, task_id: &str) -> Self {
        self.template_mut(task_name)
            .inputs
            .push(json!({"name": format!("vol-task-{task_id}-name")}));
        self
    }

    /// Passes a parameter to a task's container; `raw` is the JSON text.
    #[must_use]
    pub fn with_parameter(mut self, task_name: &str, name: &str, raw: &str) -> Self {
        self.template_mut(task_name)
            .env
            .push(json!({"name": format!("PARAMETER_{name}"), "value": raw}));
        self
    }

    fn template_mut(&mut self, name: &str) -> &mut TaskTemplate {
        let index = match self.templates.iter().position(|t| t.name == name) {
            Some(index) => index,
            None => {
                self.templates.push(TaskTemplate {
                    name: name.to_string(),
                    ..TaskTemplate::default()
                });
                self.templates.len() - 1
            }
        };
        &mut self.templates[index]
    }

    /// Renders the manifest.
    #[must_use]
    pub fn build(&self) -> Value {
        let mut metadata = json!({"name": self.name});
        if let Some(rv) = &self.resource_version {
            metadata["resourceVersion"] = json!(rv);
        }

        let mut templates = vec![json!({"name": DAG_TEMPLATE, "dag": {"tasks": self.tasks}})];
        templates.extend(self.templates.iter().map(|t| {
            json!({
                "name": t.name,
                "inputs": {"parameters": t.inputs},
                "container": {"image": "platform/task", "env": t.env},
            })
        }));

        let mut status = Map::new();
        if let Some(phase) = &self.phase {
            status.insert("phase".into(), json!(phase));
        }
        if let Some(started_at) = &self.started_at {
            status.insert("startedAt".into(), json!(started_at));
        }
        if let Some(nodes) = &self.nodes {
            status.insert("nodes".into(), Value::Object(nodes.clone()));
        }

        json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Workflow",
            "metadata": metadata,
            "spec": {"entrypoint": DAG_TEMPLATE, "templates": templates},
            "status": status,
        })
    }

    /// Wraps the manifest in a watch event.
    #[must_use]
    pub fn event(&self, event_type: WatchEventType) -> WatchEvent {
        WatchEvent::new(event_type, self.build())
    }
}

/// A Seldon deployment named after a platform deployment.
#[must_use]
pub fn seldon_deployment(id: Uuid, state: Option<&str>) -> Value {
    let mut object = json!({
        "apiVersion": "machinelearning.seldon.io/v1",
        "kind": "SeldonDeployment",
        "metadata": {"name": id.to_string()},
    });
    if let Some(state) = state {
        object["status"] = json!({"state": state});
    }
    object
}

/// A `MODIFIED` event for a bare object.
#[must_use]
pub fn modified(name: &str, resource_version: &str) -> WatchEvent {
    WatchEvent::new(
        WatchEventType::Modified,
        json!({"metadata": {"name": name, "resourceVersion": resource_version}}),
    )
}
