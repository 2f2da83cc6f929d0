//! Core domain model types for pipesync.
//!
//! This module contains the fundamental types used throughout the crate:
//! - The status vocabulary shared with existing consumers
//! - Operator and ordered-list rows
//! - Status updates and the run projection

mod model;
mod status;
mod update;

pub use model::{Collection, Operator, OrderedItem, Scope};
pub use status::Status;
pub use update::{DeploymentUpdate, MessagePatch, NodeStatus, NodeUpdate, PipelineRun};
