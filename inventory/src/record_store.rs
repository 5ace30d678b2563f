//! In-memory record store: the last-known cache state.
//!
//! Items keep the order in which they were first seen (or the order of the last
//! [`RecordStore::replace_all`]). That order is the tie-breaker for stable sorts in
//! the view projection. An item can be *hidden* while a delete for it is in flight:
//! it stays in the store so a rollback can bring it back, but it is left out of
//! [`RecordStore::visible`].

use crate::types::{InventoryItem, ItemId};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Entry {
    item: InventoryItem,
    hidden: bool,
}

/// Ordered map from item id to item
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    entries: Vec<Entry>,
    index: HashMap<ItemId, usize>,
}

impl RecordStore {
    /// An empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding `items` in order
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        let mut store = Self::new();
        store.replace_all(items);
        store
    }

    /// Look up an item, hidden or not
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&InventoryItem> {
        self.index.get(id).map(|&position| &self.entries[position].item)
    }

    pub(crate) fn get_mut(&mut self, id: &ItemId) -> Option<&mut InventoryItem> {
        let position = *self.index.get(id)?;
        Some(&mut self.entries[position].item)
    }

    /// Whether the store holds `id`
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.index.contains_key(id)
    }

    /// Insert or overwrite an item, returning the previous value
    ///
    /// An existing item keeps its position and hidden flag; a new one is appended.
    pub fn upsert(&mut self, item: InventoryItem) -> Option<InventoryItem> {
        if let Some(&position) = self.index.get(&item.id) {
            return Some(std::mem::replace(&mut self.entries[position].item, item));
        }

        self.index.insert(item.id.clone(), self.entries.len());
        self.entries.push(Entry {
            item,
            hidden: false,
        });
        None
    }

    /// Insert a missing item at `position` (clamped to the end)
    ///
    /// Overwrites in place if the item is already present.
    pub fn insert_at(&mut self, position: usize, item: InventoryItem) {
        if self.contains(&item.id) {
            self.upsert(item);
            return;
        }

        let position = position.min(self.entries.len());
        self.entries.insert(
            position,
            Entry {
                item,
                hidden: false,
            },
        );
        self.reindex_from(position);
    }

    /// Remove an item, returning it
    pub fn remove(&mut self, id: &ItemId) -> Option<InventoryItem> {
        let position = self.index.remove(id)?;
        let entry = self.entries.remove(position);
        self.reindex_from(position);
        Some(entry.item)
    }

    /// Every item in store order, hidden ones included
    #[must_use]
    pub fn list(&self) -> Vec<&InventoryItem> {
        self.entries.iter().map(|entry| &entry.item).collect()
    }

    /// Items not hidden by a pending delete, in store order
    pub fn visible(&self) -> impl Iterator<Item = &InventoryItem> {
        self.entries
            .iter()
            .filter(|entry| !entry.hidden)
            .map(|entry| &entry.item)
    }

    /// Replace the whole store with authoritative data
    ///
    /// Items absent from `items` are dropped, present ones are overwritten, and
    /// every hidden flag is cleared. A duplicated id keeps its first position and
    /// its last value.
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = InventoryItem>) {
        self.entries.clear();
        self.index.clear();
        for item in items {
            self.upsert(item);
        }
    }

    /// Hide an item from [`RecordStore::visible`]; false if absent
    pub fn hide(&mut self, id: &ItemId) -> bool {
        self.set_hidden(id, true)
    }

    /// Undo [`RecordStore::hide`]; false if absent
    pub fn reveal(&mut self, id: &ItemId) -> bool {
        self.set_hidden(id, false)
    }

    /// Whether `id` is present and hidden
    #[must_use]
    pub fn is_hidden(&self, id: &ItemId) -> bool {
        self.index
            .get(id)
            .is_some_and(|&position| self.entries[position].hidden)
    }

    /// Position of `id` in store order
    #[must_use]
    pub fn position(&self, id: &ItemId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Number of items, hidden ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn set_hidden(&mut self, id: &ItemId, hidden: bool) -> bool {
        match self.index.get(id) {
            Some(&position) => {
                self.entries[position].hidden = hidden;
                true
            },
            None => false,
        }
    }

    fn reindex_from(&mut self, start: usize) {
        for (position, entry) in self.entries.iter().enumerate().skip(start) {
            self.index.insert(entry.item.id.clone(), position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewItem;

    fn item(id: &str, quantity: u32) -> InventoryItem {
        InventoryItem::from_new(ItemId::new(id), NewItem::new(id).with_quantity(quantity))
    }

    fn ids(store: &RecordStore) -> Vec<&str> {
        store.list().iter().map(|item| item.id.as_str()).collect()
    }

    #[test]
    fn upsert_keeps_position() {
        let mut store = RecordStore::from_items([item("a", 1), item("b", 2)]);

        let previous = store.upsert(item("a", 9));

        assert_eq!(previous.map(|p| p.quantity), Some(1));
        assert_eq!(ids(&store), ["a", "b"]);
        assert_eq!(store.get(&ItemId::new("a")).map(|i| i.quantity), Some(9));
    }

    #[test]
    fn remove_reindexes() {
        let mut store = RecordStore::from_items([item("a", 1), item("b", 2), item("c", 3)]);

        assert!(store.remove(&ItemId::new("a")).is_some());
        assert!(store.remove(&ItemId::new("a")).is_none());

        assert_eq!(ids(&store), ["b", "c"]);
        assert_eq!(store.position(&ItemId::new("c")), Some(1));
        assert_eq!(store.get(&ItemId::new("c")).map(|i| i.quantity), Some(3));
    }

    #[test]
    fn insert_at_restores_position() {
        let mut store = RecordStore::from_items([item("a", 1), item("c", 3)]);

        store.insert_at(1, item("b", 2));
        store.insert_at(99, item("d", 4));

        assert_eq!(ids(&store), ["a", "b", "c", "d"]);
        assert_eq!(store.position(&ItemId::new("d")), Some(3));
    }

    #[test]
    fn hidden_items_stay_listed_but_not_visible() {
        let mut store = RecordStore::from_items([item("a", 1), item("b", 2)]);

        assert!(store.hide(&ItemId::new("a")));
        assert!(!store.hide(&ItemId::new("zzz")));

        assert!(store.is_hidden(&ItemId::new("a")));
        assert_eq!(store.len(), 2);
        assert_eq!(store.visible().count(), 1);

        assert!(store.reveal(&ItemId::new("a")));
        assert_eq!(store.visible().count(), 2);
    }

    #[test]
    fn replace_all_is_authority_wins() {
        let mut store = RecordStore::from_items([item("a", 1), item("b", 2)]);
        store.hide(&ItemId::new("b"));

        store.replace_all([item("b", 20), item("c", 30), item("b", 21)]);

        assert_eq!(ids(&store), ["b", "c"]);
        assert!(!store.contains(&ItemId::new("a")));
        assert!(!store.is_hidden(&ItemId::new("b")));
        assert_eq!(store.get(&ItemId::new("b")).map(|i| i.quantity), Some(21));
    }
}
