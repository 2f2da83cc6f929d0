//! In-memory [`Store`] implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::Store;
use crate::core::{
    Collection, DeploymentUpdate, MessagePatch, NodeUpdate, Operator, OrderedItem, Scope, Status,
};
use crate::errors::StoreError;

/// Status columns of a deployment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRow {
    /// Deployment id.
    pub id: Uuid,
    /// Current status.
    pub status: Status,
    /// When the deployment run started.
    pub deployed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tables {
    operators: HashMap<Uuid, Operator>,
    items: HashMap<(Collection, Uuid), OrderedItem>,
    deployments: HashMap<Uuid, DeploymentRow>,
}

/// A [`Store`] backed by hash maps behind a single lock.
///
/// Every trait call takes the lock once, so bulk writes are all-or-nothing.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a deployment row with status `Unset`.
    pub fn insert_deployment(&self, id: Uuid) {
        self.tables.write().deployments.insert(
            id,
            DeploymentRow {
                id,
                status: Status::Unset,
                deployed_at: None,
            },
        );
    }

    /// Returns a deployment row.
    #[must_use]
    pub fn deployment(&self, id: Uuid) -> Option<DeploymentRow> {
        self.tables.read().deployments.get(&id).cloned()
    }

    /// Returns every operator, ordered by id.
    #[must_use]
    pub fn all_operators(&self) -> Vec<Operator> {
        let mut ops: Vec<Operator> = self.tables.read().operators.values().cloned().collect();
        ops.sort_by_key(|op| op.id);
        ops
    }

    /// Number of stored operators.
    #[must_use]
    pub fn operator_count(&self) -> usize {
        self.tables.read().operators.len()
    }
}

fn apply_update(op: &mut Operator, update: &NodeUpdate) -> bool {
    let mut changed = false;
    if op.status != update.status {
        op.status = update.status.clone();
        changed = true;
    }
    if update.status_message != MessagePatch::Keep {
        let message = update.status_message.apply(op.status_message.clone());
        if op.status_message != message {
            op.status_message = message;
            changed = true;
        }
    }
    changed
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_operator(&self, id: Uuid) -> Result<Option<Operator>, StoreError> {
        Ok(self.tables.read().operators.get(&id).cloned())
    }

    async fn operators_in(&self, scope: Scope) -> Result<Vec<Operator>, StoreError> {
        let mut ops: Vec<Operator> = self
            .tables
            .read()
            .operators
            .values()
            .filter(|op| op.scope == scope)
            .cloned()
            .collect();
        ops.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(ops)
    }

    async fn upsert_operators(&self, rows: Vec<Operator>) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        for row in &rows {
            if let Some(existing) = tables.operators.get(&row.id) {
                if existing.scope != row.scope {
                    return Err(StoreError::Conflict {
                        entity: "operator",
                        id: row.id,
                        message: format!("cannot move from {} to {}", existing.scope, row.scope),
                    });
                }
            }
        }
        for row in rows {
            tables.operators.insert(row.id, row);
        }
        Ok(())
    }

    async fn delete_operator(&self, id: Uuid) -> Result<(), StoreError> {
        self.tables
            .write()
            .operators
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::not_found("operator", id))
    }

    async fn remove_operator(&self, id: Uuid, patched: Vec<Operator>) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let Some(removed) = tables.operators.get(&id) else {
            return Err(StoreError::not_found("operator", id));
        };
        let scope = removed.scope;
        for row in &patched {
            let stored_scope = tables.operators.get(&row.id).map_or(row.scope, |existing| existing.scope);
            if row.id == id || row.scope != scope || stored_scope != scope {
                return Err(StoreError::Conflict {
                    entity: "operator",
                    id: row.id,
                    message: format!("not a sibling of {id} in {scope}"),
                });
            }
        }
        tables.operators.remove(&id);
        for row in patched {
            tables.operators.insert(row.id, row);
        }
        Ok(())
    }

    async fn apply_node_updates(&self, updates: &[NodeUpdate]) -> Result<usize, StoreError> {
        let mut tables = self.tables.write();
        let now = Utc::now();
        let mut changed = 0;
        for update in updates {
            if let Some(op) = tables.operators.get_mut(&update.node_id) {
                if apply_update(op, update) {
                    op.updated_at = now;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn apply_deployment_update(&self, update: &DeploymentUpdate) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        let Some(row) = tables.deployments.get_mut(&update.deployment_id) else {
            return Ok(false);
        };
        let mut changed = false;
        if row.status != update.status {
            row.status = update.status.clone();
            changed = true;
        }
        if update.deployed_at.is_some() && row.deployed_at != update.deployed_at {
            row.deployed_at = update.deployed_at;
            changed = true;
        }
        Ok(changed)
    }

    async fn get_item(&self, collection: Collection, id: Uuid) -> Result<Option<OrderedItem>, StoreError> {
        Ok(self.tables.read().items.get(&(collection, id)).cloned())
    }

    async fn items_in(&self, collection: Collection, scope_id: Uuid) -> Result<Vec<OrderedItem>, StoreError> {
        let mut items: Vec<OrderedItem> = self
            .tables
            .read()
            .items
            .iter()
            .filter(|((c, _), item)| *c == collection && item.scope_id == scope_id)
            .map(|(_, item)| item.clone())
            .collect();
        items.sort_by(|a, b| a.position.cmp(&b.position).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn upsert_items(&self, collection: Collection, rows: Vec<OrderedItem>) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        for row in rows {
            tables.items.insert((collection, row.id), row);
        }
        Ok(())
    }

    async fn delete_item(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        self.tables
            .write()
            .items
            .remove(&(collection, id))
            .map(|_| ())
            .ok_or(StoreError::not_found("item", id))
    }

    async fn replace_items(
        &self,
        collection: Collection,
        scope_id: Uuid,
        rows: Vec<OrderedItem>,
        removed: Option<Uuid>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if let Some(id) = removed {
            if !tables.items.contains_key(&(collection, id)) {
                return Err(StoreError::not_found("item", id));
            }
        }
        for row in &rows {
            let stored_scope = tables.items.get(&(collection, row.id)).map(|item| item.scope_id);
            if row.scope_id != scope_id || stored_scope.is_some_and(|s| s != scope_id) {
                return Err(StoreError::Conflict {
                    entity: "item",
                    id: row.id,
                    message: format!("does not belong to {scope_id}"),
                });
            }
        }

        if let Some(id) = removed {
            tables.items.remove(&(collection, id));
        }
        for row in rows {
            tables.items.insert((collection, row.id), row);
        }
        Ok(())
    }
}
