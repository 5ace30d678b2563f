//! Reconciler: settles an optimistic mutation once the remote store answers.
//!
//! Both directions are single-item operations. Confirming merges the remote
//! store's answer for one item; rolling back undoes exactly what one mutation's
//! [`RestorePoint`] captured. Neither touches any other item, so concurrent
//! optimistic edits to other items survive.

use crate::aggregate::AggregateSnapshot;
use crate::applier::RestorePoint;
use crate::record_store::RecordStore;
use crate::types::{InventoryItem, ItemId, Mutation};
use serde::{Deserialize, Serialize};

/// The remote store's answer to a successful mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RemoteOutcome {
    /// The item as the remote store now holds it
    Item(InventoryItem),
    /// The item no longer exists
    Deleted(ItemId),
}

impl RemoteOutcome {
    /// The item the outcome is about
    #[must_use]
    pub const fn id(&self) -> &ItemId {
        match self {
            Self::Item(item) => &item.id,
            Self::Deleted(id) => id,
        }
    }
}

/// What confirming did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// The authoritative item was written
    Merged,
    /// The item was removed
    Removed,
    /// Nothing to do; the item had already left the cache
    Skipped,
}

/// Merge the remote store's answer to `mutation` into the cache
///
/// Idempotent: merging the same outcome twice leaves the same store and totals as
/// merging it once. Updates and adjustments of an item that a refresh has
/// meanwhile dropped are skipped rather than resurrecting it.
pub fn confirm(
    store: &mut RecordStore,
    aggregate: &mut AggregateSnapshot,
    mutation: &Mutation,
    outcome: &RemoteOutcome,
) -> Merge {
    match outcome {
        RemoteOutcome::Item(item) => {
            let may_insert = match mutation {
                Mutation::Create(_) => true,
                Mutation::Update { .. } | Mutation::Delete { .. } | Mutation::AdjustStock(_) => {
                    false
                },
            };
            if !may_insert && !store.contains(&item.id) {
                tracing::debug!(id = %item.id, "Confirmed item already left the cache");
                return Merge::Skipped;
            }
            merge_item(store, aggregate, item.clone());
            Merge::Merged
        },
        RemoteOutcome::Deleted(id) => {
            let visible = store.contains(id) && !store.is_hidden(id);
            match store.remove(id) {
                Some(removed) => {
                    if visible {
                        aggregate.exclude(&removed);
                    }
                    Merge::Removed
                },
                None => Merge::Skipped,
            }
        },
    }
}

/// Undo one mutation's optimistic effect
///
/// Restores only what the restore point captured, as it was captured. Returns
/// whether anything in the cache changed.
pub fn rollback(
    store: &mut RecordStore,
    aggregate: &mut AggregateSnapshot,
    restore: RestorePoint,
) -> bool {
    match restore {
        RestorePoint::Absent => false,

        RestorePoint::Fields { id, prior } => {
            let visible = !store.is_hidden(&id);
            let Some(item) = store.get_mut(&id) else {
                return false;
            };
            if visible {
                aggregate.exclude(item);
            }
            prior.apply_to(item);
            if visible {
                aggregate.include(item);
            }
            true
        },

        RestorePoint::Removed { prior, position } => {
            if store.is_hidden(&prior.id) {
                store.reveal(&prior.id);
                if let Some(item) = store.get(&prior.id) {
                    aggregate.include(item);
                }
                true
            } else if store.contains(&prior.id) {
                false
            } else {
                aggregate.include(&prior);
                store.insert_at(position, prior);
                true
            }
        },

        RestorePoint::Quantity { id, prior_quantity } => {
            let visible = !store.is_hidden(&id);
            let Some(item) = store.get_mut(&id) else {
                return false;
            };
            if visible {
                aggregate.exclude(item);
            }
            item.quantity = prior_quantity;
            if visible {
                aggregate.include(item);
            }
            true
        },
    }
}

/// Overwrite (or add) one item, swapping its aggregate contribution
fn merge_item(store: &mut RecordStore, aggregate: &mut AggregateSnapshot, item: InventoryItem) {
    let visible = !store.is_hidden(&item.id);
    if visible {
        aggregate.include(&item);
    }
    if let Some(previous) = store.upsert(item) {
        if visible {
            aggregate.exclude(&previous);
        }
    }
}
