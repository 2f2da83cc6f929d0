//! Deployment row updates from workflows and Seldon deployments.

use tracing::debug;
use uuid::Uuid;

use super::manifest::{SeldonDeployment, Workflow};
use super::phase::map_deployment_state;
use crate::core::{DeploymentUpdate, Scope, Status};

/// Status and start time for the deployment a workflow rolls out.
///
/// `None` for experiment workflows. A missing or `Running` phase reads as
/// `Pending`; other phases are stored verbatim.
#[must_use]
pub fn workflow_deployment_update(workflow: &Workflow) -> Option<DeploymentUpdate> {
    let Some(Scope::Deployment(deployment_id)) = workflow.scope() else {
        return None;
    };
    let status = match workflow.phase() {
        None | Some("Running") => Status::Pending,
        Some(phase) => Status::parse(phase),
    };
    Some(DeploymentUpdate {
        deployment_id,
        status,
        deployed_at: workflow.started_at(),
    })
}

/// Status for the deployment a Seldon object serves.
///
/// `None` until the object reports a state, or if its name is not a
/// deployment id.
#[must_use]
pub fn seldon_update(sdep: &SeldonDeployment) -> Option<DeploymentUpdate> {
    let state = sdep.status.as_ref()?.state.as_deref()?;
    let Ok(deployment_id) = Uuid::parse_str(&sdep.metadata.name) else {
        debug!(name = %sdep.metadata.name, "Ignoring Seldon deployment not owned by the platform");
        return None;
    };
    Some(DeploymentUpdate {
        deployment_id,
        status: map_deployment_state(state),
        deployed_at: None,
    })
}
