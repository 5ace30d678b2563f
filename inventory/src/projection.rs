//! View projection: the filtered, sorted list the UI renders.
//!
//! [`project`] is a pure function of the record store and the criteria. Sorting is
//! stable, so ties keep store order and identical inputs always produce the same
//! list.

use crate::record_store::RecordStore;
use crate::types::InventoryItem;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Which items to show
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewFilter {
    /// Every item
    #[default]
    All,
    /// Items below their reorder threshold
    LowStock,
    /// Items in a premium category
    Premium,
    /// Items whose name contains the text, ignoring case
    Search(String),
}

impl ViewFilter {
    /// Whether `item` passes the filter
    #[must_use]
    pub fn matches(&self, item: &InventoryItem, premium: &PremiumCategories) -> bool {
        match self {
            Self::All => true,
            Self::LowStock => item.is_low_stock(),
            Self::Premium => premium.contains(&item.category),
            Self::Search(text) => item.name.to_lowercase().contains(&text.to_lowercase()),
        }
    }
}

/// Field to sort by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortField {
    /// Display name
    #[default]
    Name,
    /// Jars on hand
    Quantity,
    /// Reorder threshold
    MinStock,
    /// Unit price
    Price,
    /// Net weight
    NetWeight,
    /// Stocking location
    Location,
    /// Category
    Category,
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

/// Sort criteria
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ViewSort {
    /// Field to sort by
    pub field: SortField,
    /// Direction
    pub direction: SortDirection,
}

impl ViewSort {
    /// Sort by `field` ascending
    #[must_use]
    pub const fn ascending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    /// Sort by `field` descending
    #[must_use]
    pub const fn descending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }

    fn compare(self, a: &InventoryItem, b: &InventoryItem) -> Ordering {
        let ordering = match self.field {
            SortField::Name => a.name.cmp(&b.name),
            SortField::Quantity => a.quantity.cmp(&b.quantity),
            SortField::MinStock => a.min_stock.cmp(&b.min_stock),
            SortField::Price => a.price.total_cmp(&b.price),
            SortField::NetWeight => a.net_weight.total_cmp(&b.net_weight),
            SortField::Location => a.location.cmp(&b.location),
            SortField::Category => a.category.cmp(&b.category),
        };
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Categories that mark an item as premium, compared case-insensitively
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PremiumCategories(BTreeSet<String>);

impl PremiumCategories {
    /// Build from category names
    #[must_use]
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            categories
                .into_iter()
                .map(|category| category.as_ref().trim().to_lowercase())
                .collect(),
        )
    }

    /// Whether `category` is premium
    #[must_use]
    pub fn contains(&self, category: &str) -> bool {
        self.0.contains(&category.trim().to_lowercase())
    }

    /// The categories, lowercased
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for PremiumCategories {
    fn default() -> Self {
        Self::new(["premium"])
    }
}

/// The items to render: visible, filtered, stably sorted
#[must_use]
pub fn project(
    store: &RecordStore,
    filter: &ViewFilter,
    sort: ViewSort,
    premium: &PremiumCategories,
) -> Vec<InventoryItem> {
    let mut items: Vec<InventoryItem> = store
        .visible()
        .filter(|item| filter.matches(item, premium))
        .cloned()
        .collect();
    items.sort_by(|a, b| sort.compare(a, b));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemId, Location, NewItem};

    fn item(id: &str, name: &str, quantity: u32, category: &str) -> InventoryItem {
        InventoryItem::from_new(
            ItemId::new(id),
            NewItem::new(name)
                .with_quantity(quantity)
                .with_min_stock(5)
                .with_category(category)
                .with_location(Location::Storefront),
        )
    }

    fn store() -> RecordStore {
        RecordStore::from_items([
            item("1", "Wildflower honey", 8, "Premium"),
            item("2", "Apricot jam", 2, "jam"),
            item("3", "Fig jam", 8, "jam"),
            item("4", "Chestnut honey", 1, "premium "),
        ])
    }

    fn ids(items: &[InventoryItem]) -> Vec<&str> {
        items.iter().map(|item| item.id.as_str()).collect()
    }

    #[test]
    fn sorts_stably_by_field() {
        let premium = PremiumCategories::default();
        let view = project(
            &store(),
            &ViewFilter::All,
            ViewSort::descending(SortField::Quantity),
            &premium,
        );

        // "1" and "3" tie on quantity and keep store order.
        assert_eq!(ids(&view), ["1", "3", "2", "4"]);
    }

    #[test]
    fn filters() {
        let store = store();
        let premium = PremiumCategories::default();
        let by_name = ViewSort::ascending(SortField::Name);

        let low = project(&store, &ViewFilter::LowStock, by_name, &premium);
        assert_eq!(ids(&low), ["2", "4"]);

        let premium_only = project(&store, &ViewFilter::Premium, by_name, &premium);
        assert_eq!(ids(&premium_only), ["4", "1"]);

        let search = project(&store, &ViewFilter::Search("HONEY".into()), by_name, &premium);
        assert_eq!(ids(&search), ["4", "1"]);
    }

    #[test]
    fn hidden_items_are_not_projected() {
        let mut store = store();
        store.hide(&ItemId::new("2"));

        let view = project(
            &store,
            &ViewFilter::All,
            ViewSort::default(),
            &PremiumCategories::default(),
        );

        assert!(!ids(&view).contains(&"2"));
        assert_eq!(view.len(), 3);
    }

    #[test]
    fn premium_categories_ignore_case() {
        let premium = PremiumCategories::new(["Reserve", "premium"]);

        assert!(premium.contains("RESERVE"));
        assert!(premium.contains("Premium"));
        assert!(!premium.contains("jam"));
        assert_eq!(premium.iter().collect::<Vec<_>>(), ["premium", "reserve"]);
    }
}
