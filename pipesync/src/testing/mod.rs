//! Testing utilities for pipesync.
//!
//! This module provides:
//! - A scripted list/watch API and a recording handler
//! - Workflow and Seldon manifest fixtures
//! - Assertions over store rows
//! - A store with switchable write failures

mod assertions;
mod fixtures;
mod mocks;
mod store;

pub use assertions::{assert_active, assert_dense_positions, assert_operator_status};
pub use fixtures::{modified, seldon_deployment, WorkflowFixture};
pub use mocks::{ApiCall, RecordingHandler, ScriptedWatch, ScriptedWatchApi};
pub use store::FailingStore;
