//! Derived stock statistics.

use crate::record_store::RecordStore;
use crate::types::InventoryItem;
use serde::{Deserialize, Serialize};

/// Totals over the visible items of a [`RecordStore`]
///
/// Maintained incrementally: every change to an item removes the item's old
/// contribution with [`AggregateSnapshot::exclude`] and adds the new one with
/// [`AggregateSnapshot::include`]. Floating totals accumulate rounding error this
/// way, so they are recomputed from scratch on every refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    /// Sum of quantities
    pub total_jars: u64,
    /// Sum of `price * quantity`
    pub total_value: f64,
    /// Sum of `net_weight * quantity`, in kilograms
    pub total_weight_kg: f64,
    /// Items below their reorder threshold
    pub low_stock_count: u64,
}

impl AggregateSnapshot {
    /// Totals over `items`
    #[must_use]
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a InventoryItem>) -> Self {
        let mut snapshot = Self::default();
        for item in items {
            snapshot.include(item);
        }
        snapshot
    }

    /// Totals over the visible items of `store`
    #[must_use]
    pub fn from_store(store: &RecordStore) -> Self {
        Self::from_items(store.visible())
    }

    /// Add one item's contribution
    pub fn include(&mut self, item: &InventoryItem) {
        self.total_jars = self.total_jars.saturating_add(u64::from(item.quantity));
        self.total_value += item.stock_value();
        self.total_weight_kg += item.stock_weight_kg();
        if item.is_low_stock() {
            self.low_stock_count = self.low_stock_count.saturating_add(1);
        }
    }

    /// Remove one item's contribution
    ///
    /// Never goes below zero; floating totals clamp at zero to absorb rounding.
    pub fn exclude(&mut self, item: &InventoryItem) {
        self.total_jars = self.total_jars.saturating_sub(u64::from(item.quantity));
        self.total_value = (self.total_value - item.stock_value()).max(0.0);
        self.total_weight_kg = (self.total_weight_kg - item.stock_weight_kg()).max(0.0);
        if item.is_low_stock() {
            self.low_stock_count = self.low_stock_count.saturating_sub(1);
        }
    }

    /// Whether `other` differs by more than `tolerance` in a floating total, or at all
    /// in a count
    #[must_use]
    pub fn diverges_from(&self, other: &Self, tolerance: f64) -> bool {
        self.total_jars != other.total_jars
            || self.low_stock_count != other.low_stock_count
            || (self.total_value - other.total_value).abs() > tolerance
            || (self.total_weight_kg - other.total_weight_kg).abs() > tolerance
    }
}
