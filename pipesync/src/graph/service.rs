//! Store-backed operator graph edits.

use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{detach_dependency, flatten_template, topological_order, validate_dependencies, validate_scope, TemplateTask};
use crate::core::{Operator, Scope};
use crate::errors::{PipesyncError, StoreError};
use crate::reconcile::setup_status;
use crate::store::{ScopeKey, ScopeLocks, Store};

/// Applies operator edits to a store, validating the scope's graph first.
///
/// Every edit holds the scope's lock for its whole read-validate-write
/// sequence; nothing is written when validation fails.
pub struct OperatorGraph<S: Store> {
    store: Arc<S>,
    locks: Arc<ScopeLocks>,
}

impl<S: Store> OperatorGraph<S> {
    /// Creates a graph service.
    #[must_use]
    pub const fn new(store: Arc<S>, locks: Arc<ScopeLocks>) -> Self {
        Self { store, locks }
    }

    /// Stores a new operator after validating its dependencies.
    pub async fn create(&self, operator: Operator) -> Result<Operator, PipesyncError> {
        let _guard = self.locks.lock(ScopeKey::Graph(operator.scope)).await;
        let siblings = self.store.operators_in(operator.scope).await?;
        validate_dependencies(operator.scope, operator.id, &operator.dependencies, &siblings)?;

        self.store.upsert_operators(vec![operator.clone()]).await?;
        info!(operator_id = %operator.id, scope = %operator.scope, "Operator created");
        Ok(operator)
    }

    /// Replaces an operator's dependencies.
    pub async fn set_dependencies(
        &self,
        scope: Scope,
        operator_id: Uuid,
        dependencies: Vec<Uuid>,
    ) -> Result<Operator, PipesyncError> {
        let _guard = self.locks.lock(ScopeKey::Graph(scope)).await;
        let siblings = self.store.operators_in(scope).await?;
        let mut operator = find(&siblings, operator_id)?;
        validate_dependencies(scope, operator_id, &dependencies, &siblings)?;

        operator.dependencies = dependencies;
        operator.updated_at = chrono::Utc::now();
        self.store.upsert_operators(vec![operator.clone()]).await?;
        debug!(%operator_id, %scope, "Dependencies updated");
        Ok(operator)
    }

    /// Replaces an operator's parameters and recomputes its setup status,
    /// unless a run already owns the status.
    ///
    /// `task_parameters` are the parameter names declared by the operator's task.
    pub async fn set_parameters(
        &self,
        scope: Scope,
        operator_id: Uuid,
        parameters: serde_json::Map<String, serde_json::Value>,
        task_parameters: &[String],
    ) -> Result<Operator, PipesyncError> {
        let _guard = self.locks.lock(ScopeKey::Graph(scope)).await;
        let siblings = self.store.operators_in(scope).await?;
        let mut operator = find(&siblings, operator_id)?;

        if !operator.status.is_run_state() {
            operator.status = setup_status(task_parameters, &parameters);
        }
        operator.parameters = parameters;
        operator.updated_at = chrono::Utc::now();
        self.store.upsert_operators(vec![operator.clone()]).await?;
        Ok(operator)
    }

    /// Deletes an operator and drops it from its siblings' dependencies.
    ///
    /// Returns the siblings whose dependency lists were patched.
    pub async fn remove(&self, scope: Scope, operator_id: Uuid) -> Result<Vec<Operator>, PipesyncError> {
        let _guard = self.locks.lock(ScopeKey::Graph(scope)).await;
        let siblings = self.store.operators_in(scope).await?;
        find(&siblings, operator_id)?;

        let patched = detach_dependency(&siblings, operator_id);
        let remaining: Vec<Operator> = siblings
            .iter()
            .filter(|op| op.id != operator_id)
            .map(|op| patched.iter().find(|p| p.id == op.id).unwrap_or(op).clone())
            .collect();
        validate_scope(scope, &remaining)?;

        self.store.remove_operator(operator_id, patched.clone()).await?;
        info!(%operator_id, %scope, patched = patched.len(), "Operator deleted");
        Ok(patched)
    }

    /// Returns the scope's operators in execution order.
    pub async fn execution_order(&self, scope: Scope) -> Result<Vec<Uuid>, PipesyncError> {
        let operators = self.store.operators_in(scope).await?;
        Ok(topological_order(&operators)?)
    }

    /// Flattens the scope into a reusable template.
    pub async fn template(&self, scope: Scope) -> Result<Vec<TemplateTask>, PipesyncError> {
        let operators = self.store.operators_in(scope).await?;
        Ok(flatten_template(&operators)?)
    }
}

fn find(siblings: &[Operator], operator_id: Uuid) -> Result<Operator, StoreError> {
    siblings
        .iter()
        .find(|op| op.id == operator_id)
        .cloned()
        .ok_or(StoreError::not_found("operator", operator_id))
}
