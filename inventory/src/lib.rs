//! # Stockroom Inventory
//!
//! Optimistic mutation and cache reconciliation for an inventory cache.
//!
//! The UI edits a local copy of the inventory and sees the change at once. The
//! remote store stays authoritative: each mutation is applied to the cache,
//! sent, and then either confirmed with the remote store's answer or rolled
//! back, touching only the item it targeted. A background refresh, coalesced
//! and scheduled shortly after confirmations, corrects whatever drift remains.
//!
//! ## Components
//!
//! - [`RecordStore`]: ordered item cache, with hiding for pending deletes
//! - [`AggregateSnapshot`]: totals over the visible items, kept incrementally
//! - [`applier`]: validates and applies a mutation, capturing a [`RestorePoint`]
//! - [`reconciler`]: confirms or rolls back exactly one mutation
//! - [`RefreshScheduler`]: one scheduled refresh, one fetch in flight
//! - [`project`]: the filtered, sorted view
//! - [`InventoryEngine`]: the facade, running everything on a
//!   [`Store`](stockroom_runtime::Store)
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use stockroom_inventory::{
//!     EngineConfig, InventoryEngine, MockTransport, Mutation, NewItem, StockAdjustment,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), stockroom_inventory::InventoryError> {
//! let remote = MockTransport::new();
//! let engine = InventoryEngine::new(Arc::new(remote), EngineConfig::default());
//! engine.load().await?;
//!
//! let created = engine
//!     .submit(Mutation::Create(NewItem::new("Apricot jam").with_quantity(12)))
//!     .await?
//!     .outcome()
//!     .await?;
//!
//! let shipment = engine
//!     .submit(Mutation::AdjustStock(StockAdjustment::export(created.id().clone(), 2)))
//!     .await?;
//! // Already visible, before the remote store has answered.
//! assert_eq!(engine.current_aggregate().await.total_jars, 10);
//! shipment.outcome().await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod applier;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod mocks;
pub mod projection;
pub mod reconciler;
pub mod record_store;
pub mod reducer;
pub mod scheduler;
pub mod telemetry;
pub mod types;

pub use aggregate::AggregateSnapshot;
pub use applier::RestorePoint;
pub use config::EngineConfig;
pub use engine::{InventoryEngine, MutationEvent, Subscription};
pub use environment::{InventoryEnvironment, InventoryTransport, TransportFuture};
pub use error::{InventoryError, TransportError, ValidationError};
pub use mocks::{MockRequest, MockTransport, Operation};
pub use projection::{project, PremiumCategories, SortDirection, SortField, ViewFilter, ViewSort};
pub use reconciler::{Merge, RemoteOutcome};
pub use record_store::RecordStore;
pub use reducer::{InventoryAction, InventoryReducer, InventoryState, Notice, PendingMutation, Rejection};
pub use scheduler::{RefreshDecision, RefreshReason, RefreshScheduler};
pub use types::{
    Direction, InventoryItem, ItemId, ItemPatch, Location, Mutation, MutationId, MutationKind,
    NewItem, StockAdjustment,
};
