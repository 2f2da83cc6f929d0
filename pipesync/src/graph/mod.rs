//! Operator dependency graphs.
//!
//! This module provides:
//! - Side-effect-free validation of dependency edits
//! - Deterministic topological ordering and template flattening
//! - Structural edits (delete patching, deployable selection)
//! - A store-backed service that applies edits under a scope lock

mod adjacency;
mod edit;
mod order;
mod service;
mod validator;

pub use edit::{deployment_chain, detach_dependency, select_deployable};
pub use order::{flatten_template, instantiate_template, topological_order, TemplateTask};
pub use service::OperatorGraph;
pub use validator::{validate_dependencies, validate_scope};
