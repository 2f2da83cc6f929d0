//! Store-backed list reordering.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::PositionList;
use crate::core::{Collection, OrderedItem};
use crate::errors::{PipesyncError, StoreError};
use crate::store::{ScopeKey, ScopeLocks, Store};

/// Reorders stored sibling lists.
///
/// Each operation reads the siblings, recomputes positions and writes them
/// back while holding the parent's lock, so concurrent reorders of the same
/// parent cannot produce duplicate or gapped positions.
pub struct PositionService<S: Store> {
    store: Arc<S>,
    locks: Arc<ScopeLocks>,
}

impl<S: Store> PositionService<S> {
    /// Creates a position service.
    #[must_use]
    pub const fn new(store: Arc<S>, locks: Arc<ScopeLocks>) -> Self {
        Self { store, locks }
    }

    /// Places `item` at `desired_position` among its siblings.
    ///
    /// The item may be new or already stored under `scope_id`; it is written
    /// together with the renumbered siblings. Its incoming position is ignored.
    pub async fn insert(
        &self,
        collection: Collection,
        scope_id: Uuid,
        item: OrderedItem,
        desired_position: usize,
    ) -> Result<Vec<OrderedItem>, PipesyncError> {
        if item.scope_id != scope_id {
            return Err(wrong_parent(item.id, item.scope_id, scope_id).into());
        }
        let _guard = self.locks.lock(ScopeKey::List(collection, scope_id)).await;
        if let Some(stored) = self.store.get_item(collection, item.id).await? {
            if stored.scope_id != scope_id {
                return Err(wrong_parent(item.id, stored.scope_id, scope_id).into());
            }
        }

        let item_id = item.id;
        let mut list = PositionList::new(collection, self.store.items_in(collection, scope_id).await?);
        let index = list.insert(item, desired_position);
        debug!(%collection, %scope_id, %item_id, desired_position, index, "Item placed");

        self.write(collection, scope_id, list, None).await
    }

    /// Moves a stored sibling to `new_position`.
    pub async fn move_item(
        &self,
        collection: Collection,
        scope_id: Uuid,
        item_id: Uuid,
        new_position: usize,
    ) -> Result<Vec<OrderedItem>, PipesyncError> {
        let _guard = self.locks.lock(ScopeKey::List(collection, scope_id)).await;
        let mut list = PositionList::new(collection, self.store.items_in(collection, scope_id).await?);
        let Some(index) = list.move_to(item_id, new_position) else {
            return Err(self.missing(collection, scope_id, item_id).await);
        };
        debug!(%collection, %scope_id, %item_id, new_position, index, "Item moved");

        self.write(collection, scope_id, list, None).await
    }

    /// Deletes an item and closes the gap.
    pub async fn remove(
        &self,
        collection: Collection,
        scope_id: Uuid,
        item_id: Uuid,
    ) -> Result<Vec<OrderedItem>, PipesyncError> {
        let _guard = self.locks.lock(ScopeKey::List(collection, scope_id)).await;
        let mut list = PositionList::new(collection, self.store.items_in(collection, scope_id).await?);
        if list.remove(item_id).is_none() {
            return Err(self.missing(collection, scope_id, item_id).await);
        }

        self.write(collection, scope_id, list, Some(item_id)).await
    }

    /// Renumbers a parent's siblings without naming an item.
    pub async fn normalize(&self, collection: Collection, scope_id: Uuid) -> Result<Vec<OrderedItem>, PipesyncError> {
        let _guard = self.locks.lock(ScopeKey::List(collection, scope_id)).await;
        let mut list = PositionList::new(collection, self.store.items_in(collection, scope_id).await?);
        list.normalize();

        self.write(collection, scope_id, list, None).await
    }

    async fn write(
        &self,
        collection: Collection,
        scope_id: Uuid,
        list: PositionList,
        removed: Option<Uuid>,
    ) -> Result<Vec<OrderedItem>, PipesyncError> {
        let items = list.into_items();
        self.store
            .replace_items(collection, scope_id, items.clone(), removed)
            .await?;
        Ok(items)
    }

    async fn missing(&self, collection: Collection, scope_id: Uuid, item_id: Uuid) -> PipesyncError {
        match self.store.get_item(collection, item_id).await {
            Ok(Some(stored)) => wrong_parent(item_id, stored.scope_id, scope_id).into(),
            Ok(None) => StoreError::not_found("item", item_id).into(),
            Err(e) => e.into(),
        }
    }
}

fn wrong_parent(item_id: Uuid, actual: Uuid, expected: Uuid) -> StoreError {
    StoreError::Conflict {
        entity: "item",
        id: item_id,
        message: format!("belongs to {actual}, not {expected}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::testing::{assert_active, assert_dense_positions, FailingStore};

    async fn seeded(n: usize) -> (Arc<PositionService<InMemoryStore>>, Arc<InMemoryStore>, Uuid, Vec<Uuid>) {
        let store = Arc::new(InMemoryStore::new());
        let parent = Uuid::new_v4();
        let items: Vec<OrderedItem> = (0..n).map(|i| OrderedItem::new(Uuid::new_v4(), parent, i)).collect();
        let ids = items.iter().map(|i| i.id).collect();
        store.upsert_items(Collection::Deployments, items).await.unwrap();
        let service = Arc::new(PositionService::new(store.clone(), Arc::new(ScopeLocks::new())));
        (service, store, parent, ids)
    }

    #[tokio::test]
    async fn test_insert_new_item_clamps() {
        let (service, store, parent, _) = seeded(3).await;
        let new = OrderedItem::new(Uuid::new_v4(), parent, 99);

        let items = service.insert(Collection::Deployments, parent, new.clone(), 10).await.unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[3].id, new.id);
        assert!(items[3].is_active);
        assert_eq!(store.items_in(Collection::Deployments, parent).await.unwrap(), items);
    }

    #[tokio::test]
    async fn test_insert_existing_item_moves_it() {
        let (service, _, parent, ids) = seeded(3).await;
        let existing = OrderedItem::new(ids[2], parent, 2);

        let items = service.insert(Collection::Deployments, parent, existing, 0).await.unwrap();
        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![ids[2], ids[0], ids[1]]);
        assert_dense_positions(&items);
    }

    #[tokio::test]
    async fn test_insert_rejects_item_of_other_parent() {
        let (service, store, parent, _) = seeded(1).await;
        let elsewhere = OrderedItem::new(Uuid::new_v4(), Uuid::new_v4(), 0);
        store.upsert_items(Collection::Deployments, vec![elsewhere.clone()]).await.unwrap();

        let mismatched = service.insert(Collection::Deployments, parent, elsewhere.clone(), 0).await;
        assert!(matches!(mismatched, Err(PipesyncError::Store(StoreError::Conflict { .. }))));

        let relabelled = OrderedItem::new(elsewhere.id, parent, 0);
        let stolen = service.insert(Collection::Deployments, parent, relabelled, 0).await;
        assert!(matches!(stolen, Err(PipesyncError::Store(StoreError::Conflict { .. }))));
        assert_eq!(store.items_in(Collection::Deployments, parent).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_remove_leaves_positions_intact() {
        let store = Arc::new(FailingStore::new());
        let parent = Uuid::new_v4();
        let rows: Vec<OrderedItem> = (0..3).map(|i| OrderedItem::new(Uuid::new_v4(), parent, i)).collect();
        store.upsert_items(Collection::Deployments, rows.clone()).await.unwrap();
        let service = PositionService::new(store.clone(), Arc::new(ScopeLocks::new()));

        store.set_failing(true);
        let result = service.remove(Collection::Deployments, parent, rows[0].id).await;
        assert!(matches!(result, Err(PipesyncError::Store(StoreError::Backend(_)))));

        let stored = store.items_in(Collection::Deployments, parent).await.unwrap();
        assert_eq!(stored, rows);
        assert_eq!(stored.iter().map(|i| i.position).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_remove_closes_gap() {
        let (service, store, parent, ids) = seeded(3).await;
        let items = service.remove(Collection::Deployments, parent, ids[1]).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_dense_positions(&items);
        let stored = store.items_in(Collection::Deployments, parent).await.unwrap();
        assert_eq!(stored, items);
        assert_active(&stored, ids[2]);
    }

    #[tokio::test]
    async fn test_wrong_parent_is_rejected() {
        let (service, _, _, ids) = seeded(2).await;
        let result = service.move_item(Collection::Deployments, Uuid::new_v4(), ids[0], 0).await;
        assert!(matches!(result, Err(PipesyncError::Store(StoreError::Conflict { .. }))));
    }

    #[tokio::test]
    async fn test_concurrent_moves_stay_dense() {
        let (service, store, parent, ids) = seeded(6).await;
        let mut handles = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            let service = service.clone();
            let id = *id;
            handles.push(tokio::spawn(async move {
                service.move_item(Collection::Deployments, parent, id, 5 - i).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.items_in(Collection::Deployments, parent).await.unwrap();
        assert_eq!(stored.len(), 6);
        assert_dense_positions(&stored);
        assert_eq!(stored.iter().filter(|i| i.is_active).count(), 1);
    }
}
