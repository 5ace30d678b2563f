//! Domain types for the inventory cache.
//!
//! An [`InventoryItem`] is one stocked product. Changes to the cache are described by
//! [`Mutation`] values: immutable, tagged descriptions of a single change to a single item.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an inventory item, assigned by the remote store
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an `ItemId` from the remote store's identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of one submitted mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationId(Uuid);

impl MutationId {
    /// Creates a new random `MutationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an item is stocked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Back-of-house warehouse
    Warehouse,
    /// Customer-facing shelves
    Storefront,
    /// Cool storage
    Cellar,
}

impl Location {
    /// Stable lowercase label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warehouse => "warehouse",
            Self::Storefront => "storefront",
            Self::Cellar => "cellar",
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stocked product as last seen by the cache
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    /// Identifier assigned by the remote store
    pub id: ItemId,
    /// Display name
    pub name: String,
    /// Jars on hand
    pub quantity: u32,
    /// Reorder threshold; 0 disables low-stock tracking
    pub min_stock: u32,
    /// Unit price
    pub price: f64,
    /// Net weight of one unit in grams
    pub net_weight: f64,
    /// Display label for one unit
    pub unit: String,
    /// Where the item is stocked
    pub location: Location,
    /// Free-form category; some categories mark premium items
    pub category: String,
}

impl InventoryItem {
    /// Builds the item the remote store would create from `new`
    #[must_use]
    pub fn from_new(id: ItemId, new: NewItem) -> Self {
        Self {
            id,
            name: new.name,
            quantity: new.quantity,
            min_stock: new.min_stock,
            price: new.price,
            net_weight: new.net_weight,
            unit: new.unit,
            location: new.location,
            category: new.category,
        }
    }

    /// Whether the item is below its reorder threshold
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.min_stock > 0 && self.quantity < self.min_stock
    }

    /// Value of the stock on hand
    #[must_use]
    pub fn stock_value(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }

    /// Weight of the stock on hand in kilograms
    #[must_use]
    pub fn stock_weight_kg(&self) -> f64 {
        self.net_weight * f64::from(self.quantity) / 1000.0
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "name",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), ValidationError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ValidationError::InvalidField {
            field: "price",
            reason: format!("must be a non-negative number, got {price}"),
        });
    }
    Ok(())
}

fn validate_net_weight(net_weight: f64) -> Result<(), ValidationError> {
    if !net_weight.is_finite() || net_weight <= 0.0 {
        return Err(ValidationError::InvalidField {
            field: "net_weight",
            reason: format!("must be a positive number of grams, got {net_weight}"),
        });
    }
    Ok(())
}

/// Payload of a create request; the remote store assigns the id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    /// Display name
    pub name: String,
    /// Initial jars on hand
    pub quantity: u32,
    /// Reorder threshold
    pub min_stock: u32,
    /// Unit price
    pub price: f64,
    /// Net weight of one unit in grams
    pub net_weight: f64,
    /// Display label for one unit
    pub unit: String,
    /// Where the item is stocked
    pub location: Location,
    /// Free-form category
    pub category: String,
}

impl NewItem {
    /// A new item with the given name and neutral defaults
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: 0,
            min_stock: 0,
            price: 0.0,
            net_weight: 1.0,
            unit: "jar".to_string(),
            location: Location::Warehouse,
            category: String::new(),
        }
    }

    /// Set the initial quantity
    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set the reorder threshold
    #[must_use]
    pub const fn with_min_stock(mut self, min_stock: u32) -> Self {
        self.min_stock = min_stock;
        self
    }

    /// Set the unit price
    #[must_use]
    pub const fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Set the net weight in grams
    #[must_use]
    pub const fn with_net_weight(mut self, net_weight: f64) -> Self {
        self.net_weight = net_weight;
        self
    }

    /// Set the stocking location
    #[must_use]
    pub const fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Set the category
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the unit label
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Check the payload before it is sent anywhere
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidField`] for an empty name, a negative or
    /// non-finite price, or a non-positive net weight.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_price(self.price)?;
        validate_net_weight(self.net_weight)
    }
}

/// Partial update of an item; `None` fields are left untouched
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    /// New display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New quantity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    /// New reorder threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_stock: Option<u32>,
    /// New unit price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// New net weight in grams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_weight: Option<f64>,
    /// New unit label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// New stocking location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// New category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ItemPatch {
    /// An empty patch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Change the quantity
    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Change the reorder threshold
    #[must_use]
    pub const fn with_min_stock(mut self, min_stock: u32) -> Self {
        self.min_stock = Some(min_stock);
        self
    }

    /// Change the unit price
    #[must_use]
    pub const fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Change the net weight
    #[must_use]
    pub const fn with_net_weight(mut self, net_weight: f64) -> Self {
        self.net_weight = Some(net_weight);
        self
    }

    /// Change the unit label
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Change the location
    #[must_use]
    pub const fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Change the category
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.touched_fields().is_empty()
    }

    /// Names of the fields this patch sets
    #[must_use]
    pub fn touched_fields(&self) -> Vec<&'static str> {
        [
            ("name", self.name.is_some()),
            ("quantity", self.quantity.is_some()),
            ("min_stock", self.min_stock.is_some()),
            ("price", self.price.is_some()),
            ("net_weight", self.net_weight.is_some()),
            ("unit", self.unit.is_some()),
            ("location", self.location.is_some()),
            ("category", self.category.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }

    /// Check the values this patch sets
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidField`] for an empty patch or any invalid value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "patch",
                reason: "no fields to update".to_string(),
            });
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(net_weight) = self.net_weight {
            validate_net_weight(net_weight)?;
        }
        Ok(())
    }

    /// Write the set fields into `item`
    pub fn apply_to(&self, item: &mut InventoryItem) {
        if let Some(name) = &self.name {
            item.name.clone_from(name);
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(min_stock) = self.min_stock {
            item.min_stock = min_stock;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(net_weight) = self.net_weight {
            item.net_weight = net_weight;
        }
        if let Some(unit) = &self.unit {
            item.unit.clone_from(unit);
        }
        if let Some(location) = self.location {
            item.location = location;
        }
        if let Some(category) = &self.category {
            item.category.clone_from(category);
        }
    }

    /// Capture `item`'s current values for exactly the fields this patch sets
    ///
    /// Applying the returned patch undoes `self` without touching any other field.
    #[must_use]
    pub fn snapshot_of(&self, item: &InventoryItem) -> Self {
        Self {
            name: self.name.as_ref().map(|_| item.name.clone()),
            quantity: self.quantity.map(|_| item.quantity),
            min_stock: self.min_stock.map(|_| item.min_stock),
            price: self.price.map(|_| item.price),
            net_weight: self.net_weight.map(|_| item.net_weight),
            unit: self.unit.as_ref().map(|_| item.unit.clone()),
            location: self.location.map(|_| item.location),
            category: self.category.as_ref().map(|_| item.category.clone()),
        }
    }
}

/// Direction of a stock adjustment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Jars received
    Import,
    /// Jars shipped out
    Export,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Import => f.write_str("import"),
            Self::Export => f.write_str("export"),
        }
    }
}

/// A stock import or export against one item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    /// Target item
    pub id: ItemId,
    /// Import or export
    pub direction: Direction,
    /// Jars moved; must be positive
    pub amount: u32,
    /// Supplier or customer on the other side of the movement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner: Option<String>,
}

impl StockAdjustment {
    /// Receive `amount` jars of `id`
    #[must_use]
    pub fn import(id: impl Into<ItemId>, amount: u32) -> Self {
        Self {
            id: id.into(),
            direction: Direction::Import,
            amount,
            partner: None,
        }
    }

    /// Ship `amount` jars of `id`
    #[must_use]
    pub fn export(id: impl Into<ItemId>, amount: u32) -> Self {
        Self {
            id: id.into(),
            direction: Direction::Export,
            amount,
            partner: None,
        }
    }

    /// Record the partner on the other side of the movement
    #[must_use]
    pub fn with_partner(mut self, partner: impl Into<String>) -> Self {
        self.partner = Some(partner.into());
        self
    }

    /// Signed change in quantity
    #[must_use]
    pub fn delta(&self) -> i64 {
        match self.direction {
            Direction::Import => i64::from(self.amount),
            Direction::Export => -i64::from(self.amount),
        }
    }
}

/// Kind of a [`Mutation`], used as a metric and log label
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// [`Mutation::Create`]
    Create,
    /// [`Mutation::Update`]
    Update,
    /// [`Mutation::Delete`]
    Delete,
    /// [`Mutation::AdjustStock`]
    AdjustStock,
}

impl MutationKind {
    /// Stable snake-case label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::AdjustStock => "adjust_stock",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change to the inventory, described before it happens
///
/// Mutations are values: a retry is a new `Mutation`, never an edited one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    /// Create an item; the id is assigned by the remote store
    Create(NewItem),
    /// Change some fields of an item
    Update {
        /// Target item
        id: ItemId,
        /// Fields to change
        patch: ItemPatch,
    },
    /// Delete an item
    Delete {
        /// Target item
        id: ItemId,
    },
    /// Import or export stock
    AdjustStock(StockAdjustment),
}

impl Mutation {
    /// Shorthand for [`Mutation::Update`]
    #[must_use]
    pub fn update(id: impl Into<ItemId>, patch: ItemPatch) -> Self {
        Self::Update {
            id: id.into(),
            patch,
        }
    }

    /// Shorthand for [`Mutation::Delete`]
    #[must_use]
    pub fn delete(id: impl Into<ItemId>) -> Self {
        Self::Delete { id: id.into() }
    }

    /// The item this mutation targets, if it already exists
    #[must_use]
    pub const fn target(&self) -> Option<&ItemId> {
        match self {
            Self::Create(_) => None,
            Self::Update { id, .. } | Self::Delete { id } => Some(id),
            Self::AdjustStock(adjustment) => Some(&adjustment.id),
        }
    }

    /// The mutation's kind
    #[must_use]
    pub const fn kind(&self) -> MutationKind {
        match self {
            Self::Create(_) => MutationKind::Create,
            Self::Update { .. } => MutationKind::Update,
            Self::Delete { .. } => MutationKind::Delete,
            Self::AdjustStock(_) => MutationKind::AdjustStock,
        }
    }

    /// Human-readable description for notifications
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Create(new) => format!("create \"{}\"", new.name),
            Self::Update { id, patch } => {
                format!("update {} of {id}", patch.touched_fields().join(", "))
            },
            Self::Delete { id } => format!("delete {id}"),
            Self::AdjustStock(adjustment) => format!(
                "{} {} of {}",
                adjustment.direction, adjustment.amount, adjustment.id
            ),
        }
    }
}
