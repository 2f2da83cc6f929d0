//! Orchestrator phase to platform status tables.

use uuid::Uuid;

use crate::core::{MessagePatch, NodeUpdate, Status};

/// Node messages that flap during normal start and retry races. They never
/// overwrite the stored message.
pub const SUPPRESSED_MESSAGES: [&str; 4] = [
    "ContainerCreating",
    "omitted: depends condition not met",
    "failed with exit code 1",
    "pod deleted",
];

/// The node message that marks a user interruption.
pub const TERMINATED_MESSAGE: &str = "terminated";

/// Maps a workflow node phase. Unknown phases pass through.
#[must_use]
pub fn map_node_phase(phase: &str) -> Status {
    match phase {
        "Pending" => Status::Pending,
        "Running" => Status::Running,
        "Succeeded" | "Skipped" => Status::Succeeded,
        "Failed" | "Error" | "Omitted" => Status::Failed,
        "Terminated" => Status::Terminated,
        other => Status::parse(other),
    }
}

/// Maps a Seldon deployment state. Unknown states pass through.
#[must_use]
pub fn map_deployment_state(state: &str) -> Status {
    match state {
        "Available" => Status::Succeeded,
        "Creating" => Status::Pending,
        other => Status::parse(other),
    }
}

/// Returns true if the message must not replace the stored one.
#[must_use]
pub fn is_suppressed(message: &str) -> bool {
    SUPPRESSED_MESSAGES.contains(&message)
}

/// Status implied by a node's phase and message.
///
/// A `terminated` message wins over the phase; a node without a phase is
/// `Pending`.
#[must_use]
pub fn node_status(phase: Option<&str>, message: Option<&str>) -> Status {
    if message == Some(TERMINATED_MESSAGE) {
        Status::Terminated
    } else {
        phase.map_or(Status::Pending, map_node_phase)
    }
}

/// Derives an operator update from one node's phase and message.
///
/// A `terminated` message clears the stored message. A suppressed message
/// keeps the stored one while the status still applies. An absent message
/// clears it.
#[must_use]
pub fn node_update(node_id: Uuid, phase: Option<&str>, message: Option<&str>) -> NodeUpdate {
    let message = message.filter(|m| !m.is_empty());
    let status_message = match message {
        None | Some(TERMINATED_MESSAGE) => MessagePatch::Clear,
        Some(text) if is_suppressed(text) => MessagePatch::Keep,
        Some(text) => MessagePatch::Set(text.to_string()),
    };
    NodeUpdate {
        node_id,
        status: node_status(phase, message),
        status_message,
    }
}
