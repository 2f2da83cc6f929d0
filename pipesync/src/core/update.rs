//! Status updates derived from orchestrator state, and the run projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::Status;

/// What to do with a row's `status_message`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum MessagePatch {
    /// Leave the stored message as it is.
    #[default]
    Keep,
    /// Store null.
    Clear,
    /// Store the given text.
    Set(String),
}

impl MessagePatch {
    /// Applies the patch to a stored message.
    #[must_use]
    pub fn apply(&self, current: Option<String>) -> Option<String> {
        match self {
            Self::Keep => current,
            Self::Clear => None,
            Self::Set(text) => Some(text.clone()),
        }
    }
}

/// A status change for one operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUpdate {
    /// The operator id.
    pub node_id: Uuid,
    /// The new status.
    pub status: Status,
    /// The message change.
    pub status_message: MessagePatch,
}

impl NodeUpdate {
    /// Creates an update that leaves the message alone.
    #[must_use]
    pub const fn status_only(node_id: Uuid, status: Status) -> Self {
        Self {
            node_id,
            status,
            status_message: MessagePatch::Keep,
        }
    }
}

/// A status change for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentUpdate {
    /// The deployment id.
    pub deployment_id: Uuid,
    /// The new status.
    pub status: Status,
    /// When the deployment run started, if the update carries it.
    pub deployed_at: Option<DateTime<Utc>>,
}

/// Per-node state in a [`PipelineRun`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Reconciled status.
    pub status: Status,
    /// Raw orchestrator message.
    pub message: Option<String>,
    /// When the node started.
    pub started_at: Option<DateTime<Utc>>,
    /// The task the node runs, when the manifest declares it.
    pub task_id: Option<String>,
    /// Parameter values passed to the node.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl NodeStatus {
    /// Creates a node state with only a status.
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            status,
            message: None,
            started_at: None,
            task_id: None,
            parameters: serde_json::Map::new(),
        }
    }
}

/// Read-only projection of an orchestrator run, re-derived on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Orchestrator run id.
    pub run_id: String,
    /// The experiment or deployment id the run belongs to, when known.
    pub scope_id: Option<Uuid>,
    /// When the run started.
    pub started_at: Option<DateTime<Utc>>,
    /// Node states keyed by display name (the operator id).
    pub node_statuses: BTreeMap<String, NodeStatus>,
}
