//! Rows owned by the platform: operators and ordered list items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::Status;

/// The owner of an operator graph: an experiment or a deployment, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    /// Operators of an experiment.
    Experiment(Uuid),
    /// Operators of a deployment.
    Deployment(Uuid),
}

impl Scope {
    /// Returns the owning entity's id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Experiment(id) | Self::Deployment(id) => *id,
        }
    }

    /// Returns the scope kind as used in workflow names.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Experiment(_) => "experiment",
            Self::Deployment(_) => "deployment",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind(), self.id())
    }
}

/// A task instance placed in an experiment or deployment pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    /// Operator id; also the node display name in compiled workflows.
    pub id: Uuid,
    /// The owning experiment or deployment.
    pub scope: Scope,
    /// The task this operator instantiates.
    pub task_id: Uuid,
    /// Sibling operators that must finish first.
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    /// Task parameter values.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// Current status.
    #[serde(default)]
    pub status: Status,
    /// Last user-visible message from the orchestrator.
    #[serde(default)]
    pub status_message: Option<String>,
    /// Canvas x coordinate, stored and returned unchanged.
    #[serde(default)]
    pub canvas_x: Option<f64>,
    /// Canvas y coordinate, stored and returned unchanged.
    #[serde(default)]
    pub canvas_y: Option<f64>,
    /// Creation time; the stable tie-breaker for topological order.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Operator {
    /// Creates an operator with no dependencies and no parameters.
    #[must_use]
    pub fn new(id: Uuid, scope: Scope, task_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            scope,
            task_id,
            dependencies: Vec::new(),
            parameters: serde_json::Map::new(),
            status: Status::Unset,
            status_message: None,
            canvas_x: None,
            canvas_y: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = Uuid>) -> Self {
        self.dependencies = deps.into_iter().collect();
        self
    }

    /// Sets a parameter value.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    /// Sets the canvas coordinates.
    #[must_use]
    pub const fn with_canvas(mut self, x: f64, y: f64) -> Self {
        self.canvas_x = Some(x);
        self.canvas_y = Some(y);
        self
    }

    /// Returns true if the operator has no dependencies.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// A sibling collection kept in dense 0..N-1 order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Experiments of a project.
    Experiments,
    /// Deployments of a project.
    Deployments,
    /// Result comparisons of a project.
    Comparisons,
}

impl Collection {
    /// Returns true if exactly one sibling is marked active.
    #[must_use]
    pub const fn tracks_active(self) -> bool {
        matches!(self, Self::Experiments | Self::Deployments)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Experiments => write!(f, "experiments"),
            Self::Deployments => write!(f, "deployments"),
            Self::Comparisons => write!(f, "comparisons"),
        }
    }
}

/// An element of an ordered sibling list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedItem {
    /// Item id.
    pub id: Uuid,
    /// The parent (project) id.
    pub scope_id: Uuid,
    /// Index within the siblings.
    pub position: usize,
    /// Whether this is the selected sibling.
    #[serde(default)]
    pub is_active: bool,
}

impl OrderedItem {
    /// Creates an inactive item.
    #[must_use]
    pub const fn new(id: Uuid, scope_id: Uuid, position: usize) -> Self {
        Self {
            id,
            scope_id,
            position,
            is_active: false,
        }
    }

    /// Marks the item active.
    #[must_use]
    pub const fn active(mut self) -> Self {
        self.is_active = true;
        self
    }
}
