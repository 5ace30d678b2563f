//! Optimistic applier: makes a mutation visible before the remote store confirms it.
//!
//! [`apply`] validates first and only then touches the store, so a rejected
//! mutation leaves both the store and the aggregate exactly as they were. On
//! success it returns a [`RestorePoint`] holding just enough of the prior state to
//! undo this one mutation.

use crate::aggregate::AggregateSnapshot;
use crate::error::ValidationError;
use crate::record_store::RecordStore;
use crate::types::{Direction, InventoryItem, ItemId, ItemPatch, Mutation, StockAdjustment};

/// What a mutation changed, captured when it was applied
///
/// There is one variant per mutation kind, so the reconciler's match stays in
/// step with the applier's.
#[derive(Debug, Clone, PartialEq)]
pub enum RestorePoint {
    /// A create changes nothing until it is confirmed
    Absent,
    /// Prior values of the fields an update set
    Fields {
        /// Target item
        id: ItemId,
        /// Prior values of exactly the touched fields
        prior: ItemPatch,
    },
    /// An item hidden by a pending delete
    Removed {
        /// The item as it was before the delete
        prior: InventoryItem,
        /// Its position in store order
        position: usize,
    },
    /// Prior quantity of an adjusted item
    Quantity {
        /// Target item
        id: ItemId,
        /// Quantity before the adjustment
        prior_quantity: u32,
    },
}

/// Check a mutation against the current store without changing anything
///
/// # Errors
///
/// Returns the [`ValidationError`] that [`apply`] would return.
pub fn validate(store: &RecordStore, mutation: &Mutation) -> Result<(), ValidationError> {
    match mutation {
        Mutation::Create(new) => new.validate(),
        Mutation::Update { id, patch } => {
            patch.validate()?;
            live_item(store, id).map(|_| ())
        },
        Mutation::Delete { id } => live_item(store, id).map(|_| ()),
        Mutation::AdjustStock(adjustment) => adjusted_quantity(store, adjustment).map(|_| ()),
    }
}

/// Apply `mutation` to `store` and `aggregate` optimistically
///
/// - `Create` changes nothing; the item appears when the remote store confirms it
/// - `Update` merges the patch into the item
/// - `Delete` hides the item and removes its contribution; it stays in the store
///   until the delete is confirmed
/// - `AdjustStock` moves the quantity by the adjustment's delta
///
/// # Errors
///
/// Returns a [`ValidationError`] and leaves everything untouched if the mutation
/// is invalid, targets an unknown or hidden item, or would export more than the
/// stock on hand.
pub fn apply(
    store: &mut RecordStore,
    aggregate: &mut AggregateSnapshot,
    mutation: &Mutation,
) -> Result<RestorePoint, ValidationError> {
    validate(store, mutation)?;

    let restore = match mutation {
        Mutation::Create(_) => RestorePoint::Absent,

        Mutation::Update { id, patch } => {
            let item = store
                .get_mut(id)
                .ok_or_else(|| ValidationError::UnknownItem { id: id.clone() })?;
            let prior = patch.snapshot_of(item);
            aggregate.exclude(item);
            patch.apply_to(item);
            aggregate.include(item);
            RestorePoint::Fields {
                id: id.clone(),
                prior,
            }
        },

        Mutation::Delete { id } => {
            let position = store
                .position(id)
                .ok_or_else(|| ValidationError::UnknownItem { id: id.clone() })?;
            let prior = store
                .get(id)
                .cloned()
                .ok_or_else(|| ValidationError::UnknownItem { id: id.clone() })?;
            aggregate.exclude(&prior);
            store.hide(id);
            RestorePoint::Removed { prior, position }
        },

        Mutation::AdjustStock(adjustment) => {
            let quantity = adjusted_quantity(store, adjustment)?;
            let item = store.get_mut(&adjustment.id).ok_or_else(|| {
                ValidationError::UnknownItem {
                    id: adjustment.id.clone(),
                }
            })?;
            let prior_quantity = item.quantity;
            aggregate.exclude(item);
            item.quantity = quantity;
            aggregate.include(item);
            RestorePoint::Quantity {
                id: adjustment.id.clone(),
                prior_quantity,
            }
        },
    };

    tracing::debug!(operation = %mutation.describe(), "Applied optimistically");
    Ok(restore)
}

/// An item that exists and is not being deleted
fn live_item<'a>(
    store: &'a RecordStore,
    id: &ItemId,
) -> Result<&'a InventoryItem, ValidationError> {
    let item = store
        .get(id)
        .ok_or_else(|| ValidationError::UnknownItem { id: id.clone() })?;
    if store.is_hidden(id) {
        return Err(ValidationError::PendingDelete { id: id.clone() });
    }
    Ok(item)
}

/// Quantity after `adjustment`, or why it cannot happen
fn adjusted_quantity(
    store: &RecordStore,
    adjustment: &StockAdjustment,
) -> Result<u32, ValidationError> {
    let id = &adjustment.id;
    if adjustment.amount == 0 {
        return Err(ValidationError::ZeroAmount { id: id.clone() });
    }

    let available = live_item(store, id)?.quantity;
    match adjustment.direction {
        Direction::Import => available
            .checked_add(adjustment.amount)
            .ok_or_else(|| ValidationError::QuantityOverflow { id: id.clone() }),
        Direction::Export => {
            available
                .checked_sub(adjustment.amount)
                .ok_or_else(|| ValidationError::InsufficientStock {
                    id: id.clone(),
                    requested: adjustment.amount,
                    available,
                })
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code: setups are known-valid
mod tests {
    use super::*;
    use crate::types::NewItem;

    fn item(id: &str, quantity: u32) -> InventoryItem {
        InventoryItem::from_new(
            ItemId::new(id),
            NewItem::new(id)
                .with_quantity(quantity)
                .with_min_stock(3)
                .with_price(4.0),
        )
    }

    fn setup(items: impl IntoIterator<Item = InventoryItem>) -> (RecordStore, AggregateSnapshot) {
        let store = RecordStore::from_items(items);
        let aggregate = AggregateSnapshot::from_store(&store);
        (store, aggregate)
    }

    #[test]
    fn export_down_to_zero_then_rejects() {
        let (mut store, mut aggregate) = setup([item("jam", 5)]);

        let restore = apply(
            &mut store,
            &mut aggregate,
            &Mutation::AdjustStock(StockAdjustment::export("jam", 5)),
        );
        assert_eq!(
            restore,
            Ok(RestorePoint::Quantity {
                id: ItemId::new("jam"),
                prior_quantity: 5
            })
        );
        assert_eq!(store.get(&ItemId::new("jam")).map(|i| i.quantity), Some(0));

        let rejected = apply(
            &mut store,
            &mut aggregate,
            &Mutation::AdjustStock(StockAdjustment::export("jam", 1)),
        );
        assert_eq!(
            rejected,
            Err(ValidationError::InsufficientStock {
                id: ItemId::new("jam"),
                requested: 1,
                available: 0
            })
        );
        assert_eq!(store.get(&ItemId::new("jam")).map(|i| i.quantity), Some(0));
        assert_eq!(aggregate.total_jars, 0);
    }

    #[test]
    fn adjust_moves_total_jars_by_delta() {
        let (mut store, mut aggregate) = setup([item("jam", 10), item("honey", 7)]);

        apply(
            &mut store,
            &mut aggregate,
            &Mutation::AdjustStock(StockAdjustment::import("jam", 3)),
        )
        .unwrap();

        assert_eq!(aggregate.total_jars, 20);
        assert!(!aggregate.diverges_from(&AggregateSnapshot::from_store(&store), 1e-9));
    }

    #[test]
    fn rejects_zero_amount_and_overflow() {
        let (mut store, mut aggregate) = setup([item("jam", u32::MAX - 1)]);
        let before = store.clone();

        let zero = apply(
            &mut store,
            &mut aggregate,
            &Mutation::AdjustStock(StockAdjustment::import("jam", 0)),
        );
        let overflow = apply(
            &mut store,
            &mut aggregate,
            &Mutation::AdjustStock(StockAdjustment::import("jam", 2)),
        );

        assert!(matches!(zero, Err(ValidationError::ZeroAmount { .. })));
        assert!(matches!(overflow, Err(ValidationError::QuantityOverflow { .. })));
        assert_eq!(store.list(), before.list());
    }

    #[test]
    fn create_is_request_and_wait() {
        let (mut store, mut aggregate) = setup([item("jam", 1)]);
        let before = aggregate;

        let restore = apply(
            &mut store,
            &mut aggregate,
            &Mutation::Create(NewItem::new("Honey").with_quantity(12)),
        );

        assert_eq!(restore, Ok(RestorePoint::Absent));
        assert_eq!(store.len(), 1);
        assert_eq!(aggregate, before);
    }

    #[test]
    fn update_captures_touched_fields() {
        let (mut store, mut aggregate) = setup([item("jam", 1)]);

        let restore = apply(
            &mut store,
            &mut aggregate,
            &Mutation::update("jam", ItemPatch::new().with_quantity(9).with_price(1.0)),
        )
        .unwrap();

        assert_eq!(
            restore,
            RestorePoint::Fields {
                id: ItemId::new("jam"),
                prior: ItemPatch::new().with_quantity(1).with_price(4.0),
            }
        );
        assert_eq!(aggregate.total_jars, 9);
        assert_eq!(aggregate.low_stock_count, 0);
    }

    #[test]
    fn delete_hides_and_rejects_followups() {
        let (mut store, mut aggregate) = setup([item("jam", 2), item("honey", 4)]);

        let restore = apply(&mut store, &mut aggregate, &Mutation::delete("honey")).unwrap();

        assert!(matches!(restore, RestorePoint::Removed { position: 1, .. }));
        assert!(store.is_hidden(&ItemId::new("honey")));
        assert_eq!(aggregate.total_jars, 2);

        let again = apply(&mut store, &mut aggregate, &Mutation::delete("honey"));
        assert_eq!(
            again,
            Err(ValidationError::PendingDelete {
                id: ItemId::new("honey")
            })
        );
    }

    #[test]
    fn unknown_items_are_rejected() {
        let (mut store, mut aggregate) = setup(Vec::new());

        let result = apply(&mut store, &mut aggregate, &Mutation::delete("ghost"));

        assert_eq!(
            result,
            Err(ValidationError::UnknownItem {
                id: ItemId::new("ghost")
            })
        );
    }
}
