//! Injected dependencies of the inventory reducer.

use crate::aggregate::AggregateSnapshot;
use crate::error::TransportError;
use crate::projection::ViewFilter;
use crate::types::{InventoryItem, ItemId, ItemPatch, NewItem, StockAdjustment};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use stockroom_core::environment::{Clock, SystemClock};

/// Boxed future returned by [`InventoryTransport`] methods
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Access to the authoritative remote store
///
/// Implemented by the HTTP layer in production and by
/// [`MockTransport`](crate::mocks::MockTransport) in tests. Methods return boxed
/// futures so the trait stays object-safe.
pub trait InventoryTransport: Send + Sync {
    /// Create an item; the remote store assigns its id
    fn create_item(&self, item: NewItem) -> TransportFuture<'_, InventoryItem>;

    /// Apply a partial update
    fn update_item(&self, id: ItemId, patch: ItemPatch) -> TransportFuture<'_, InventoryItem>;

    /// Delete an item
    fn delete_item(&self, id: ItemId) -> TransportFuture<'_, ()>;

    /// Import or export stock
    fn adjust_stock(&self, adjustment: StockAdjustment) -> TransportFuture<'_, InventoryItem>;

    /// Fetch every item matching `filter`
    fn fetch_all(&self, filter: ViewFilter) -> TransportFuture<'_, Vec<InventoryItem>>;

    /// Fetch the remote store's own totals
    fn fetch_stats(&self) -> TransportFuture<'_, AggregateSnapshot>;
}

/// Environment for [`InventoryReducer`](crate::reducer::InventoryReducer)
#[derive(Clone)]
pub struct InventoryEnvironment {
    /// Remote store access
    pub transport: Arc<dyn InventoryTransport>,
    /// Clock for timestamps and latency measurement
    pub clock: Arc<dyn Clock>,
}

impl InventoryEnvironment {
    /// Creates a new `InventoryEnvironment`
    #[must_use]
    pub fn new(transport: Arc<dyn InventoryTransport>, clock: Arc<dyn Clock>) -> Self {
        Self { transport, clock }
    }

    /// An environment using the system clock
    #[must_use]
    pub fn with_system_clock(transport: Arc<dyn InventoryTransport>) -> Self {
        Self::new(transport, Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for InventoryEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryEnvironment").finish_non_exhaustive()
    }
}
