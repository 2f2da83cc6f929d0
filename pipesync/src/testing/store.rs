//! A store whose writes can be switched off.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::core::{Collection, DeploymentUpdate, NodeUpdate, Operator, OrderedItem, Scope};
use crate::errors::StoreError;
use crate::store::{InMemoryStore, Store};

/// Wraps an [`InMemoryStore`]; while failing, every write returns
/// `StoreError::Backend` and leaves the rows alone. Reads always pass through.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: InMemoryStore,
    failing: AtomicBool,
}

impl FailingStore {
    /// Creates a store that accepts writes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts or stops failing writes.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Backend("down".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn get_operator(&self, id: Uuid) -> Result<Option<Operator>, StoreError> {
        self.inner.get_operator(id).await
    }

    async fn operators_in(&self, scope: Scope) -> Result<Vec<Operator>, StoreError> {
        self.inner.operators_in(scope).await
    }

    async fn upsert_operators(&self, rows: Vec<Operator>) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_operators(rows).await
    }

    async fn delete_operator(&self, id: Uuid) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete_operator(id).await
    }

    async fn remove_operator(&self, id: Uuid, patched: Vec<Operator>) -> Result<(), StoreError> {
        self.check()?;
        self.inner.remove_operator(id, patched).await
    }

    async fn apply_node_updates(&self, updates: &[NodeUpdate]) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.apply_node_updates(updates).await
    }

    async fn apply_deployment_update(&self, update: &DeploymentUpdate) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.apply_deployment_update(update).await
    }

    async fn get_item(&self, collection: Collection, id: Uuid) -> Result<Option<OrderedItem>, StoreError> {
        self.inner.get_item(collection, id).await
    }

    async fn items_in(&self, collection: Collection, scope_id: Uuid) -> Result<Vec<OrderedItem>, StoreError> {
        self.inner.items_in(collection, scope_id).await
    }

    async fn upsert_items(&self, collection: Collection, rows: Vec<OrderedItem>) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_items(collection, rows).await
    }

    async fn delete_item(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete_item(collection, id).await
    }

    async fn replace_items(
        &self,
        collection: Collection,
        scope_id: Uuid,
        rows: Vec<OrderedItem>,
        removed: Option<Uuid>,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.inner.replace_items(collection, scope_id, rows, removed).await
    }
}
