//! Orchestrator state to platform status.
//!
//! This module provides:
//! - Typed workflow and Seldon manifests
//! - The phase tables and message suppression rules
//! - `StatusReconciler`, which converges operator and deployment rows
//! - Run projection and the polling `RunStatusApi`
//! - Watch handlers for the agent's two loops

mod deployment;
mod handlers;
mod manifest;
mod phase;
mod reconciler;
mod run;
mod setup;

#[cfg(feature = "kube-http")]
mod kfp;

pub use deployment::{seldon_update, workflow_deployment_update};
pub use handlers::{SeldonHandler, WorkflowHandler};
pub use manifest::{
    Container, Dag, DagTask, Inputs, NamedValue, ObjectMeta, SeldonDeployment, SeldonStatus, Template, Workflow,
    WorkflowNode, WorkflowSpec, WorkflowStatus,
};
pub use phase::{
    is_suppressed, map_deployment_state, map_node_phase, node_status, node_update, SUPPRESSED_MESSAGES,
    TERMINATED_MESSAGE,
};
pub use reconciler::{plan, reconcile, ReconcilePlan, ReconcileReport, StatusReconciler};
pub use run::{project_run, RunManifest, RunStatusApi};
#[cfg(test)]
pub use run::MockRunStatusApi;
pub use setup::setup_status;

#[cfg(feature = "kube-http")]
pub use kfp::KfpRunClient;
