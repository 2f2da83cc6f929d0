//! Typed views of the orchestrator objects the reconciler reads.
//!
//! Only the fields that drive status are modelled; everything else in the
//! manifests is ignored.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;
use uuid::Uuid;

use crate::core::Scope;
use crate::errors::PipesyncError;

static WORKFLOW_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(experiment|deployment)-(.*)-\w+"));

/// `metadata` of a Kubernetes object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectMeta {
    /// Object name.
    #[serde(default)]
    pub name: String,
    /// Resource version.
    #[serde(default, rename = "resourceVersion")]
    pub resource_version: Option<String>,
}

/// An Argo workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct Workflow {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Compiled pipeline.
    #[serde(default)]
    pub spec: WorkflowSpec,
    /// Progress; absent while the workflow is being created.
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
}

/// `spec` of a workflow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowSpec {
    /// Templates: one DAG plus one per task.
    #[serde(default)]
    pub templates: Vec<Template>,
}

/// A workflow template.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Template {
    /// Template name; task templates are named after the operator id.
    #[serde(default)]
    pub name: String,
    /// Present on the entrypoint DAG template.
    #[serde(default)]
    pub dag: Option<Dag>,
    /// Declared inputs.
    #[serde(default)]
    pub inputs: Option<Inputs>,
    /// Container of a task template.
    #[serde(default)]
    pub container: Option<Container>,
}

/// A DAG template body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dag {
    /// The DAG's tasks.
    #[serde(default)]
    pub tasks: Vec<DagTask>,
}

/// One task of a DAG.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DagTask {
    /// Task name; the operator id for platform tasks.
    pub name: String,
    /// Names of the tasks it waits for.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Template inputs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inputs {
    /// Input parameters.
    #[serde(default)]
    pub parameters: Vec<NamedValue>,
}

/// A named template parameter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedValue {
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    #[serde(default)]
    pub value: Option<String>,
}

/// A task container.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Container {
    /// Environment variables.
    #[serde(default)]
    pub env: Vec<NamedValue>,
}

/// `status` of a workflow.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    /// Workflow phase.
    #[serde(default)]
    pub phase: Option<String>,
    /// Start time (RFC 3339).
    #[serde(default)]
    pub started_at: Option<String>,
    /// Node states keyed by node id; absent while the run initialises.
    #[serde(default)]
    pub nodes: Option<BTreeMap<String, WorkflowNode>>,
}

/// State of one workflow node.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    /// Display name; the operator id for platform tasks.
    #[serde(default)]
    pub display_name: String,
    /// Node phase.
    #[serde(default)]
    pub phase: Option<String>,
    /// Node message.
    #[serde(default)]
    pub message: Option<String>,
    /// Start time (RFC 3339).
    #[serde(default)]
    pub started_at: Option<String>,
}

impl Workflow {
    /// Parses a workflow from a watch object.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, PipesyncError> {
        Self::deserialize(value).map_err(|e| PipesyncError::Manifest(format!("workflow: {e}")))
    }

    /// The workflow phase, if reported.
    #[must_use]
    pub fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.phase.as_deref())
    }

    /// The node map, if the orchestrator has produced one.
    #[must_use]
    pub fn nodes(&self) -> Option<&BTreeMap<String, WorkflowNode>> {
        self.status.as_ref().and_then(|s| s.nodes.as_ref())
    }

    /// When the workflow started.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.status
            .as_ref()
            .and_then(|s| s.started_at.as_deref())
            .and_then(parse_timestamp)
    }

    /// The experiment or deployment the workflow was compiled from,
    /// recovered from its name.
    #[must_use]
    pub fn scope(&self) -> Option<Scope> {
        let pattern = WORKFLOW_NAME.as_ref().ok()?;
        let captures = pattern.captures(&self.metadata.name)?;
        let id = Uuid::parse_str(captures.get(2)?.as_str()).ok()?;
        match captures.get(1)?.as_str() {
            "experiment" => Some(Scope::Experiment(id)),
            "deployment" => Some(Scope::Deployment(id)),
            _ => None,
        }
    }

    /// Tasks of the entrypoint DAG.
    #[must_use]
    pub fn dag_tasks(&self) -> &[DagTask] {
        self.spec
            .templates
            .iter()
            .find_map(|t| t.dag.as_ref())
            .map_or(&[], |dag| dag.tasks.as_slice())
    }

    /// The template with the given name.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.spec.templates.iter().find(|t| t.name == name)
    }
}

/// A Seldon deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct SeldonDeployment {
    /// Object metadata; the name is the platform deployment id.
    pub metadata: ObjectMeta,
    /// Rollout status; absent until the operator reports one.
    #[serde(default)]
    pub status: Option<SeldonStatus>,
}

/// `status` of a Seldon deployment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeldonStatus {
    /// Rollout state, e.g. `Available` or `Creating`.
    #[serde(default)]
    pub state: Option<String>,
}

impl SeldonDeployment {
    /// Parses a Seldon deployment from a watch object.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, PipesyncError> {
        Self::deserialize(value).map_err(|e| PipesyncError::Manifest(format!("seldon deployment: {e}")))
    }
}

/// Parses an RFC 3339 timestamp, logging and dropping malformed values.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!(value = raw, error = %e, "Ignoring malformed timestamp");
            None
        }
    }
}
