//! # Pipesync
//!
//! Graph validation, list ordering and orchestrator status sync for an ML
//! pipeline authoring platform.
//!
//! Pipesync provides:
//!
//! - **Dependency graphs**: side-effect-free validation of operator edits,
//!   deterministic execution order and template flattening
//! - **Ordered lists**: dense `0..N-1` positions with a single active item
//! - **Watch sessions**: a resumable list/watch loop that relists when its
//!   cursor expires
//! - **Reconciliation**: orchestrator phases mapped onto the platform's
//!   status vocabulary and written idempotently
//! - **Persistence agent**: supervised watch loops with per-kind retry budgets
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipesync::prelude::*;
//!
//! let config = AgentConfig::from_env()?;
//! init_tracing(&config.log_level, config.log_format);
//!
//! let api = Arc::new(KubeHttpApi::new("https://kubernetes.default.svc"));
//! let agent = PersistenceAgent::for_store(
//!     api,
//!     store,
//!     &config,
//!     CancellationToken::new(),
//!     Arc::new(LoggingAlertSink),
//! );
//! agent.run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod agent;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod graph;
pub mod observability;
pub mod positions;
pub mod reconcile;
pub mod retry;
pub mod store;
pub mod testing;
pub mod watch;

#[cfg(test)]
mod integration_tests;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agent::{sync_run, PersistenceAgent, WatchLoop};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{AgentConfig, LogFormat, WatchConfig};
    pub use crate::core::{
        Collection, DeploymentUpdate, MessagePatch, NodeStatus, NodeUpdate, Operator, OrderedItem, PipelineRun,
        Scope, Status,
    };
    pub use crate::errors::{
        ConfigError, ContractErrorInfo, GraphError, PipesyncError, StoreError, ValidationError,
        ValidationErrorKind, WatchError,
    };
    pub use crate::graph::{
        deployment_chain, detach_dependency, flatten_template, select_deployable, topological_order,
        validate_dependencies, OperatorGraph, TemplateTask,
    };
    pub use crate::observability::{init_tracing, Alert, AlertSink, LoggingAlertSink};
    pub use crate::positions::{PositionList, PositionService};
    pub use crate::reconcile::{
        plan, project_run, reconcile, setup_status, RunStatusApi, SeldonHandler, StatusReconciler,
        WorkflowHandler,
    };
    pub use crate::retry::{with_retry, BackoffStrategy, JitterStrategy, RetryConfig};
    pub use crate::store::{InMemoryStore, ScopeLocks, Store};
    pub use crate::watch::{
        ResourceKind, WatchApi, WatchCursor, WatchEvent, WatchEventType, WatchHandler, WatchSession,
    };

    #[cfg(feature = "kube-http")]
    pub use crate::reconcile::KfpRunClient;
    #[cfg(feature = "kube-http")]
    pub use crate::watch::KubeHttpApi;
}
