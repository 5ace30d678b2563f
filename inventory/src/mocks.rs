//! In-memory remote store for tests and benches.
//!
//! [`MockTransport`] behaves like the real inventory service: it assigns ids,
//! enforces stock on exports and answers 404 for unknown items. Tests can inject
//! failures and pause individual operations to control interleavings.

use crate::aggregate::AggregateSnapshot;
use crate::environment::{InventoryTransport, TransportFuture};
use crate::error::TransportError;
use crate::projection::{PremiumCategories, ViewFilter};
use crate::types::{Direction, InventoryItem, ItemId, ItemPatch, NewItem, StockAdjustment};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// A transport operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `create_item`
    Create,
    /// `update_item`
    Update,
    /// `delete_item`
    Delete,
    /// `adjust_stock`
    AdjustStock,
    /// `fetch_all`
    FetchAll,
    /// `fetch_stats`
    FetchStats,
}

/// A request received by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum MockRequest {
    /// `create_item`
    Create(NewItem),
    /// `update_item`
    Update(ItemId, ItemPatch),
    /// `delete_item`
    Delete(ItemId),
    /// `adjust_stock`
    AdjustStock(StockAdjustment),
    /// `fetch_all`
    FetchAll(ViewFilter),
    /// `fetch_stats`
    FetchStats,
}

impl MockRequest {
    /// The operation requested
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Create(_) => Operation::Create,
            Self::Update(..) => Operation::Update,
            Self::Delete(_) => Operation::Delete,
            Self::AdjustStock(_) => Operation::AdjustStock,
            Self::FetchAll(_) => Operation::FetchAll,
            Self::FetchStats => Operation::FetchStats,
        }
    }

    /// The item the request targets
    #[must_use]
    pub const fn target(&self) -> Option<&ItemId> {
        match self {
            Self::Update(id, _) | Self::Delete(id) => Some(id),
            Self::AdjustStock(adjustment) => Some(&adjustment.id),
            Self::Create(_) | Self::FetchAll(_) | Self::FetchStats => None,
        }
    }
}

type Matcher = Box<dyn Fn(&MockRequest) -> bool + Send>;

struct FailureRule {
    matcher: Matcher,
    error: TransportError,
    remaining: usize,
}

#[derive(Default)]
struct Server {
    items: Vec<InventoryItem>,
    next_id: u64,
    stats: Option<AggregateSnapshot>,
    rules: Vec<FailureRule>,
    requests: Vec<MockRequest>,
}

impl Server {
    fn take_failure(&mut self, request: &MockRequest) -> Option<TransportError> {
        let index = self.rules.iter().position(|rule| (rule.matcher)(request))?;
        let rule = &mut self.rules[index];
        let error = rule.error.clone();
        rule.remaining -= 1;
        if rule.remaining == 0 {
            self.rules.remove(index);
        }
        Some(error)
    }

    fn find(&mut self, id: &ItemId) -> Result<&mut InventoryItem, TransportError> {
        self.items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| TransportError::status(404, format!("no item {id}")))
    }

    fn create(&mut self, new: NewItem) -> InventoryItem {
        self.next_id += 1;
        let item = InventoryItem::from_new(ItemId::new(format!("item-{}", self.next_id)), new);
        self.items.push(item.clone());
        item
    }

    fn update(&mut self, id: &ItemId, patch: &ItemPatch) -> Result<InventoryItem, TransportError> {
        let item = self.find(id)?;
        patch.apply_to(item);
        Ok(item.clone())
    }

    fn delete(&mut self, id: &ItemId) -> Result<(), TransportError> {
        let index = self
            .items
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| TransportError::status(404, format!("no item {id}")))?;
        self.items.remove(index);
        Ok(())
    }

    fn adjust(&mut self, adjustment: &StockAdjustment) -> Result<InventoryItem, TransportError> {
        let item = self.find(&adjustment.id)?;
        let quantity = match adjustment.direction {
            Direction::Import => item.quantity.checked_add(adjustment.amount),
            Direction::Export => item.quantity.checked_sub(adjustment.amount),
        }
        .ok_or_else(|| TransportError::status(422, "insufficient stock"))?;
        item.quantity = quantity;
        Ok(item.clone())
    }
}

/// In-memory [`InventoryTransport`]
///
/// Clones share the same server.
#[derive(Clone)]
pub struct MockTransport {
    server: Arc<Mutex<Server>>,
    paused: Arc<watch::Sender<HashSet<Operation>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("items", &self.items().len())
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    /// An empty remote store
    #[must_use]
    pub fn new() -> Self {
        let (paused, _) = watch::channel(HashSet::new());
        Self {
            server: Arc::new(Mutex::new(Server::default())),
            paused: Arc::new(paused),
        }
    }

    /// A remote store holding `items`
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        let transport = Self::new();
        transport.lock().items.extend(items);
        transport
    }

    fn lock(&self) -> MutexGuard<'_, Server> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next request for `operation`
    pub fn fail_next(&self, operation: Operation, error: TransportError) {
        self.fail_times(operation, 1, error);
    }

    /// Fail the next `times` requests for `operation`
    pub fn fail_times(&self, operation: Operation, times: usize, error: TransportError) {
        self.add_rule(
            Box::new(move |request| request.operation() == operation),
            times,
            error,
        );
    }

    /// Fail the next request matching `matcher`
    pub fn fail_when<F>(&self, matcher: F, error: TransportError)
    where
        F: Fn(&MockRequest) -> bool + Send + 'static,
    {
        self.add_rule(Box::new(matcher), 1, error);
    }

    fn add_rule(&self, matcher: Matcher, times: usize, error: TransportError) {
        if times == 0 {
            return;
        }
        self.lock().rules.push(FailureRule {
            matcher,
            error,
            remaining: times,
        });
    }

    /// Drop all pending failure rules
    pub fn clear_failures(&self) {
        self.lock().rules.clear();
    }

    /// Hold requests for `operation` until [`resume`](Self::resume)
    pub fn pause(&self, operation: Operation) {
        self.paused.send_modify(|paused| {
            paused.insert(operation);
        });
    }

    /// Release held and future requests for `operation`
    pub fn resume(&self, operation: Operation) {
        self.paused.send_modify(|paused| {
            paused.remove(&operation);
        });
    }

    async fn wait_while_paused(&self, operation: Operation) {
        let mut paused = self.paused.subscribe();
        loop {
            let held = paused.borrow_and_update().contains(&operation);
            if !held || paused.changed().await.is_err() {
                return;
            }
        }
    }

    /// Every request processed so far, in order
    #[must_use]
    pub fn requests(&self) -> Vec<MockRequest> {
        self.lock().requests.clone()
    }

    /// Number of processed requests for `operation`
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|request| request.operation() == operation)
            .count()
    }

    /// The remote store's items
    #[must_use]
    pub fn items(&self) -> Vec<InventoryItem> {
        self.lock().items.clone()
    }

    /// One remote item
    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<InventoryItem> {
        self.lock().items.iter().find(|item| &item.id == id).cloned()
    }

    /// Write an item directly, as another client would
    pub fn put_item(&self, item: InventoryItem) {
        let mut server = self.lock();
        match server.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => server.items.push(item),
        }
    }

    /// Remove an item directly, as another client would
    pub fn remove_item(&self, id: &ItemId) -> Option<InventoryItem> {
        let mut server = self.lock();
        let index = server.items.iter().position(|item| &item.id == id)?;
        Some(server.items.remove(index))
    }

    /// Override the totals answered by `fetch_stats`; `None` computes them
    pub fn set_stats(&self, stats: Option<AggregateSnapshot>) {
        self.lock().stats = stats;
    }

    fn call<T, H>(&self, request: MockRequest, handler: H) -> TransportFuture<'_, T>
    where
        T: Send + 'static,
        H: FnOnce(&mut Server) -> Result<T, TransportError> + Send + 'static,
    {
        Box::pin(async move {
            self.wait_while_paused(request.operation()).await;

            let mut server = self.lock();
            server.requests.push(request.clone());
            if let Some(error) = server.take_failure(&request) {
                return Err(error);
            }
            handler(&mut *server)
        })
    }
}

impl InventoryTransport for MockTransport {
    fn create_item(&self, item: NewItem) -> TransportFuture<'_, InventoryItem> {
        let new = item.clone();
        self.call(MockRequest::Create(item), move |server| Ok(server.create(new)))
    }

    fn update_item(&self, id: ItemId, patch: ItemPatch) -> TransportFuture<'_, InventoryItem> {
        self.call(MockRequest::Update(id.clone(), patch.clone()), move |server| {
            server.update(&id, &patch)
        })
    }

    fn delete_item(&self, id: ItemId) -> TransportFuture<'_, ()> {
        self.call(MockRequest::Delete(id.clone()), move |server| server.delete(&id))
    }

    fn adjust_stock(&self, adjustment: StockAdjustment) -> TransportFuture<'_, InventoryItem> {
        self.call(MockRequest::AdjustStock(adjustment.clone()), move |server| {
            server.adjust(&adjustment)
        })
    }

    fn fetch_all(&self, filter: ViewFilter) -> TransportFuture<'_, Vec<InventoryItem>> {
        self.call(MockRequest::FetchAll(filter.clone()), move |server| {
            let premium = PremiumCategories::default();
            Ok(server
                .items
                .iter()
                .filter(|item| filter.matches(item, &premium))
                .cloned()
                .collect())
        })
    }

    fn fetch_stats(&self) -> TransportFuture<'_, AggregateSnapshot> {
        self.call(MockRequest::FetchStats, |server| {
            Ok(server
                .stats
                .unwrap_or_else(|| AggregateSnapshot::from_items(&server.items)))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn jam(quantity: u32) -> InventoryItem {
        InventoryItem::from_new(ItemId::new("jam"), NewItem::new("Jam").with_quantity(quantity))
    }

    #[tokio::test]
    async fn behaves_like_the_remote_store() {
        let transport = MockTransport::with_items([jam(3)]);

        let created = assert_ok!(transport.create_item(NewItem::new("Honey")).await);
        assert_eq!(created.id.as_str(), "item-1");

        let shipped = transport
            .adjust_stock(StockAdjustment::export("jam", 2))
            .await
            .unwrap();
        assert_eq!(shipped.quantity, 1);

        let too_many = assert_err!(
            transport
                .adjust_stock(StockAdjustment::export("jam", 2))
                .await
        );
        assert_eq!(too_many, TransportError::status(422, "insufficient stock"));

        let missing = assert_err!(transport.delete_item(ItemId::new("nope")).await);
        assert!(matches!(missing, TransportError::Status { code: 404, .. }));

        assert_eq!(transport.fetch_all(ViewFilter::All).await.unwrap().len(), 2);
        assert_eq!(transport.fetch_stats().await.unwrap().total_jars, 1);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let transport = MockTransport::with_items([jam(3)]);
        transport.fail_next(Operation::FetchAll, TransportError::Timeout);
        transport.fail_when(
            |request| request.target().is_some_and(|id| id.as_str() == "jam"),
            TransportError::status(409, "stale"),
        );

        assert_eq!(
            transport.fetch_all(ViewFilter::All).await.unwrap_err(),
            TransportError::Timeout
        );
        assert!(transport.fetch_all(ViewFilter::All).await.is_ok());

        assert!(transport.delete_item(ItemId::new("jam")).await.is_err());
        assert!(transport.item(&ItemId::new("jam")).is_some());
        assert!(transport.delete_item(ItemId::new("jam")).await.is_ok());

        assert_eq!(transport.calls(Operation::FetchAll), 2);
        assert_eq!(transport.calls(Operation::Delete), 2);
    }

    #[tokio::test]
    async fn paused_operations_wait_for_resume() {
        let transport = MockTransport::with_items([jam(3)]);
        transport.pause(Operation::AdjustStock);

        let remote = transport.clone();
        let call = tokio::spawn(async move {
            remote
                .adjust_stock(StockAdjustment::import("jam", 1))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.calls(Operation::AdjustStock), 0);
        assert_eq!(transport.item(&ItemId::new("jam")).unwrap().quantity, 3);

        transport.resume(Operation::AdjustStock);
        let item = call.await.unwrap().unwrap();
        assert_eq!(item.quantity, 4);
    }
}
