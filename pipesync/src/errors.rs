//! Error types for pipesync.
//!
//! Validation errors are client-facing and carry a [`ContractErrorInfo`];
//! watch errors are operational and classified as transient or fatal so the
//! caller can pick a retry budget per resource kind.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Message returned to clients for every malformed dependency list.
pub const DEPENDENCIES_EXCEPTION_MSG: &str = "The specified dependencies are not valid.";

/// Message returned to clients when the dependency graph would contain a cycle.
pub const CYCLICAL_DEPENDENCIES_MSG: &str = "Cyclical dependencies.";

/// The main error type for pipesync operations.
#[derive(Debug, Error)]
pub enum PipesyncError {
    /// A dependency edit was rejected.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A deployment graph has an unsupported shape.
    #[error("{0}")]
    Graph(#[from] GraphError),

    /// The orchestrator list/watch API failed.
    #[error("{0}")]
    Watch(#[from] WatchError),

    /// The backing store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Configuration could not be loaded or is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// An orchestrator manifest could not be decoded.
    #[error("Manifest error: {0}")]
    Manifest(String),
}

impl From<serde_json::Error> for PipesyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Manifest(err.to_string())
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "DEPENDENCY-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// The reason a proposed dependency set was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    /// The same id appears more than once.
    DuplicateDependency,
    /// The candidate lists itself.
    SelfDependency,
    /// An id is not a sibling in the same scope.
    UnknownDependency,
    /// The resulting graph has a cycle.
    CyclicDependency,
}

impl ValidationErrorKind {
    /// Stable error code for the kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DuplicateDependency => "DEPENDENCY-DUPLICATE",
            Self::SelfDependency => "DEPENDENCY-SELF",
            Self::UnknownDependency => "DEPENDENCY-UNKNOWN",
            Self::CyclicDependency => "DEPENDENCY-CYCLE",
        }
    }

    const fn fix_hint(self) -> &'static str {
        match self {
            Self::DuplicateDependency => "List each dependency once.",
            Self::SelfDependency => "An operator cannot depend on itself.",
            Self::UnknownDependency => {
                "Dependencies must reference operators of the same experiment or deployment."
            }
            Self::CyclicDependency => "Remove one of the dependencies in the cycle to break it.",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateDependency => write!(f, "DuplicateDependency"),
            Self::SelfDependency => write!(f, "SelfDependency"),
            Self::UnknownDependency => write!(f, "UnknownDependency"),
            Self::CyclicDependency => write!(f, "CyclicDependency"),
        }
    }
}

/// Error raised when a dependency edit is rejected before any mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", self.client_message())]
pub struct ValidationError {
    /// Why the edit was rejected.
    pub kind: ValidationErrorKind,
    /// The operator whose dependencies were being validated.
    pub operator_id: Uuid,
    /// The offending ids: the duplicate, unknown id, or the cycle path.
    pub offending: Vec<Uuid>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(kind: ValidationErrorKind, operator_id: Uuid, offending: Vec<Uuid>) -> Self {
        let summary = match kind {
            ValidationErrorKind::CyclicDependency => format!(
                "Dependency cycle: {}",
                offending
                    .iter()
                    .map(Uuid::to_string)
                    .collect::<Vec<_>>()
                    .join(" -> ")
            ),
            _ => format!("{kind} on operator {operator_id}"),
        };
        let error_info = ContractErrorInfo::new(kind.code(), summary)
            .with_fix_hint(kind.fix_hint())
            .with_context_entry("operator_id", operator_id.to_string());

        Self {
            kind,
            operator_id,
            offending,
            error_info,
        }
    }

    /// The text shown to API clients.
    #[must_use]
    pub const fn client_message(&self) -> &'static str {
        match self.kind {
            ValidationErrorKind::CyclicDependency => CYCLICAL_DEPENDENCIES_MSG,
            _ => DEPENDENCIES_EXCEPTION_MSG,
        }
    }
}

/// Error raised when a deployment graph cannot be turned into an inference chain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// No operator is free of dependencies.
    #[error("deployment can't have cycles")]
    NoRoot,
    /// More than one operator is free of dependencies.
    #[error("deployment can't have multiple roots: {0:?}")]
    MultipleRoots(Vec<Uuid>),
    /// An operator feeds more than one downstream operator.
    #[error("deployment can't have multiple dependencies (operator {0})")]
    Branching(Uuid),
    /// Some operators are not reachable from the root.
    #[error("deployment has unreachable operators: {0:?}")]
    Unreachable(Vec<Uuid>),
}

/// Errors surfaced by the orchestrator list/watch API.
///
/// A stale cursor ("Gone") is not an error: it is reported as a tagged
/// outcome and recovered by relisting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WatchError {
    /// A network blip or a retryable API error.
    #[error("transient watch error on {resource}: {message}")]
    Transient {
        /// The watched resource.
        resource: String,
        /// Description of the failure.
        message: String,
    },

    /// Authentication failure, malformed selector, or any error retrying cannot fix.
    #[error("fatal watch error on {resource}: {message}")]
    Fatal {
        /// The watched resource.
        resource: String,
        /// Description of the failure.
        message: String,
    },
}

impl WatchError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates a fatal error.
    #[must_use]
    pub fn fatal(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Classifies an HTTP status code returned by the API server.
    ///
    /// 410 is handled by the caller before classification.
    #[must_use]
    pub fn from_status(resource: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        match code {
            400 | 401 | 403 | 404 | 422 => Self::fatal(resource, format!("{code}: {}", message.into())),
            _ => Self::transient(resource, format!("{code}: {}", message.into())),
        }
    }

    /// Returns true if retrying may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Errors raised by a [`crate::store::Store`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity kind.
        entity: &'static str,
        /// The missing id.
        id: Uuid,
    },

    /// A write conflicted with the row's current scope.
    #[error("conflict on {entity} {id}: {message}")]
    Conflict {
        /// The entity kind.
        entity: &'static str,
        /// The conflicting id.
        id: Uuid,
        /// Description of the conflict.
        message: String,
    },

    /// The backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a not-found error.
    #[must_use]
    pub const fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds an unusable value.
    #[error("invalid configuration for {field}: {reason}")]
    Invalid {
        /// The offending field.
        field: String,
        /// Why it is invalid.
        reason: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("could not load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    /// Creates an invalid-field error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
