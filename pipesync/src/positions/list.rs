//! Dense sibling ordering.

use uuid::Uuid;

use crate::core::{Collection, OrderedItem};

/// The siblings of one parent, kept at positions `0..N-1`.
///
/// Untouched siblings keep their relative order. For collections that track
/// an active item, every operation leaves exactly one sibling active.
#[derive(Debug, Clone)]
pub struct PositionList {
    collection: Collection,
    items: Vec<OrderedItem>,
}

impl PositionList {
    /// Creates a list from stored siblings, ordered by their prior position.
    ///
    /// Gaps and duplicate positions in the input are tolerated; the sort is
    /// stable and the list is renumbered by the first operation.
    #[must_use]
    pub fn new(collection: Collection, mut items: Vec<OrderedItem>) -> Self {
        items.sort_by_key(|item| item.position);
        Self { collection, items }
    }

    /// The collection this list orders.
    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    /// The siblings in order.
    #[must_use]
    pub fn items(&self) -> &[OrderedItem] {
        &self.items
    }

    /// Consumes the list, returning the siblings in order.
    #[must_use]
    pub fn into_items(self) -> Vec<OrderedItem> {
        self.items
    }

    /// Number of siblings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no siblings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Places `item` at `desired`, clamped to `[0, N]` where N counts the
    /// other siblings. An item already in the list is moved.
    ///
    /// Returns the index the item landed at.
    pub fn insert(&mut self, item: OrderedItem, desired: usize) -> usize {
        let id = item.id;
        self.items.retain(|existing| existing.id != id);
        let index = desired.min(self.items.len());
        self.items.insert(index, item);
        self.renumber(Some(id));
        index
    }

    /// Removes an item and closes the gap.
    ///
    /// The last sibling becomes active when the collection tracks one.
    pub fn remove(&mut self, id: Uuid) -> Option<OrderedItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        let removed = self.items.remove(index);
        self.renumber(None);
        Some(removed)
    }

    /// Moves an existing item to `new_position`.
    ///
    /// Returns the index it landed at, or `None` if the item is not a sibling.
    pub fn move_to(&mut self, id: Uuid, new_position: usize) -> Option<usize> {
        let index = self.items.iter().position(|item| item.id == id)?;
        let item = self.items.remove(index);
        Some(self.insert(item, new_position))
    }

    /// Renumbers without naming an item: the last sibling becomes active.
    pub fn normalize(&mut self) {
        self.renumber(None);
    }

    /// The active sibling, if any.
    #[must_use]
    pub fn active(&self) -> Option<&OrderedItem> {
        self.items.iter().find(|item| item.is_active)
    }

    fn renumber(&mut self, named: Option<Uuid>) {
        let tracks_active = self.collection.tracks_active();
        let last = self.items.len().saturating_sub(1);
        for (index, item) in self.items.iter_mut().enumerate() {
            item.position = index;
            if tracks_active {
                item.is_active = named.map_or(index == last, |id| item.id == id);
            }
        }
    }
}
