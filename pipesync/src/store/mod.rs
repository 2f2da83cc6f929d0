//! The persistence collaborator.
//!
//! The platform's database is external; this module defines the operations
//! the core needs from it, an in-memory implementation, and per-scope locks
//! for read-recompute-write sequences.

mod locks;
mod memory;

pub use locks::{ScopeGuard, ScopeKey, ScopeLocks};
pub use memory::{DeploymentRow, InMemoryStore};

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::{Collection, DeploymentUpdate, NodeUpdate, Operator, OrderedItem, Scope};
use crate::errors::StoreError;

/// Storage operations used by the graph, position and status components.
///
/// Each call is atomic on its own; sequences that must not interleave with
/// other writers of the same scope are serialised by [`ScopeLocks`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Loads one operator.
    async fn get_operator(&self, id: Uuid) -> Result<Option<Operator>, StoreError>;

    /// Loads every operator of a scope.
    async fn operators_in(&self, scope: Scope) -> Result<Vec<Operator>, StoreError>;

    /// Inserts or replaces operators.
    async fn upsert_operators(&self, rows: Vec<Operator>) -> Result<(), StoreError>;

    /// Deletes an operator.
    async fn delete_operator(&self, id: Uuid) -> Result<(), StoreError>;

    /// Deletes an operator and writes its patched siblings in one step.
    ///
    /// Either both happen or neither does.
    async fn remove_operator(&self, id: Uuid, patched: Vec<Operator>) -> Result<(), StoreError>;

    /// Applies status updates, writing only fields whose value changes.
    ///
    /// Updates for unknown operators are ignored. Returns the number of rows
    /// that changed.
    async fn apply_node_updates(&self, updates: &[NodeUpdate]) -> Result<usize, StoreError>;

    /// Applies a deployment status update. Returns false if the deployment
    /// is unknown or nothing changed.
    async fn apply_deployment_update(&self, update: &DeploymentUpdate) -> Result<bool, StoreError>;

    /// Loads one list item.
    async fn get_item(&self, collection: Collection, id: Uuid) -> Result<Option<OrderedItem>, StoreError>;

    /// Loads every item under a parent.
    async fn items_in(&self, collection: Collection, scope_id: Uuid) -> Result<Vec<OrderedItem>, StoreError>;

    /// Inserts or replaces list items.
    async fn upsert_items(&self, collection: Collection, rows: Vec<OrderedItem>) -> Result<(), StoreError>;

    /// Deletes a list item.
    async fn delete_item(&self, collection: Collection, id: Uuid) -> Result<(), StoreError>;

    /// Rewrites a parent's siblings in one step, deleting `removed` first.
    ///
    /// Every row must belong to `scope_id`. Nothing is written on error.
    async fn replace_items(
        &self,
        collection: Collection,
        scope_id: Uuid,
        rows: Vec<OrderedItem>,
        removed: Option<Uuid>,
    ) -> Result<(), StoreError>;
}
