//! The engine facade the UI talks to.
//!
//! [`InventoryEngine`] wraps a [`Store`] running the [`InventoryReducer`]. Reads
//! take a snapshot under the store's read lock; every write is an action.

use crate::aggregate::AggregateSnapshot;
use crate::config::EngineConfig;
use crate::environment::{InventoryEnvironment, InventoryTransport};
use crate::error::InventoryError;
use crate::projection::{project, ViewFilter, ViewSort};
use crate::reconciler::RemoteOutcome;
use crate::reducer::{InventoryAction, InventoryReducer, InventoryState, Notice, Rejection};
use crate::scheduler::RefreshReason;
use crate::telemetry;
use crate::types::{InventoryItem, ItemId, Mutation, MutationId};
use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use stockroom_core::environment::Clock;
use stockroom_runtime::{HealthCheck, HealthStatus, Store, StoreError};
use tokio::sync::broadcast::{self, error::RecvError};

type InventoryStore = Store<InventoryState, InventoryAction, InventoryEnvironment, InventoryReducer>;

/// Consecutive refresh failures after which the engine reports itself unhealthy
const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Progress of one submitted mutation
#[derive(Debug, Clone, PartialEq)]
pub enum MutationEvent {
    /// Applied to the cache; the remote call is running
    Applied,
    /// The remote store accepted it
    Confirmed(RemoteOutcome),
    /// The remote store refused it and the cache was restored
    RolledBack(Notice),
}

/// Events for one accepted mutation: `Applied`, then exactly one of
/// `Confirmed` or `RolledBack`
#[derive(Debug)]
pub struct Subscription {
    mutation_id: MutationId,
    applied_sent: bool,
    finished: bool,
    actions: broadcast::Receiver<InventoryAction>,
}

impl Subscription {
    /// The id assigned to the mutation
    #[must_use]
    pub const fn mutation_id(&self) -> MutationId {
        self.mutation_id
    }

    /// The next event, or `None` once the mutation has settled
    pub async fn next(&mut self) -> Option<MutationEvent> {
        if self.finished {
            return None;
        }
        if !self.applied_sent {
            self.applied_sent = true;
            return Some(MutationEvent::Applied);
        }

        loop {
            match self.actions.recv().await {
                Ok(InventoryAction::RemoteSucceeded { id, outcome }) if id == self.mutation_id => {
                    self.finished = true;
                    return Some(MutationEvent::Confirmed(outcome));
                },
                Ok(InventoryAction::RolledBack(notice)) if notice.mutation_id == self.mutation_id => {
                    self.finished = true;
                    return Some(MutationEvent::RolledBack(notice));
                },
                Ok(_) => {},
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(mutation_id = %self.mutation_id, skipped, "Mutation subscriber lagged");
                },
                Err(RecvError::Closed) => {
                    self.finished = true;
                    return None;
                },
            }
        }
    }

    /// Wait for the mutation to settle
    ///
    /// # Errors
    ///
    /// Returns the rollback's error if the remote store refused the mutation, or
    /// [`InventoryError::ShuttingDown`] if the engine went away first.
    pub async fn outcome(mut self) -> Result<RemoteOutcome, InventoryError> {
        while let Some(event) = self.next().await {
            match event {
                MutationEvent::Applied => {},
                MutationEvent::Confirmed(outcome) => return Ok(outcome),
                MutationEvent::RolledBack(notice) => return Err(notice.error),
            }
        }
        Err(InventoryError::ShuttingDown)
    }

    /// The events as a stream
    pub fn into_stream(mut self) -> impl Stream<Item = MutationEvent> + Send {
        async_stream::stream! {
            while let Some(event) = self.next().await {
                yield event;
            }
        }
    }
}

/// Optimistic inventory cache backed by a remote store
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct InventoryEngine {
    store: InventoryStore,
    config: EngineConfig,
}

impl std::fmt::Debug for InventoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InventoryEngine {
    /// Creates an engine using the system clock
    ///
    /// The cache starts empty; call [`load`](Self::load) to fill it.
    #[must_use]
    pub fn new(transport: Arc<dyn InventoryTransport>, config: EngineConfig) -> Self {
        Self::with_environment(InventoryEnvironment::with_system_clock(transport), config)
    }

    /// Creates an engine with an explicit clock
    #[must_use]
    pub fn with_clock(
        transport: Arc<dyn InventoryTransport>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self::with_environment(InventoryEnvironment::new(transport, clock), config)
    }

    /// Creates an engine from a prepared environment
    #[must_use]
    pub fn with_environment(environment: InventoryEnvironment, config: EngineConfig) -> Self {
        telemetry::register_metrics();

        let store = Store::with_config(
            InventoryState::new(),
            InventoryReducer::new(config.clone()),
            environment,
            config.store.clone(),
        );
        Self { store, config }
    }

    /// The configuration in use
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fill the cache from the remote store
    ///
    /// Returns the number of cached items.
    ///
    /// # Errors
    ///
    /// Returns the classified fetch error, or [`InventoryError::Transient`] if the
    /// fetch did not finish within the configured load timeout.
    pub async fn load(&self) -> Result<usize, InventoryError> {
        self.refresh(RefreshReason::Initial).await
    }

    /// Refetch now, without waiting for the scheduled refresh
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub async fn refresh_now(&self) -> Result<usize, InventoryError> {
        self.refresh(RefreshReason::Manual).await
    }

    async fn refresh(&self, reason: RefreshReason) -> Result<usize, InventoryError> {
        let timeout = self.config.load_timeout;
        // A fetch already running was started before this call; wait for a later one.
        let earliest = self
            .store
            .state(|state| state.refresh().upcoming_generation())
            .await;
        let finished = self
            .store
            .send_and_wait_for(
                InventoryAction::RequestRefresh { reason },
                move |action| match action {
                    InventoryAction::RefreshLoaded { generation, .. }
                    | InventoryAction::RefreshFailed { generation, .. } => *generation >= earliest,
                    _ => false,
                },
                timeout,
            )
            .await
            .map_err(|error| match error {
                StoreError::Timeout => {
                    InventoryError::Transient(format!("refresh did not finish within {timeout:?}"))
                },
                other => other.into(),
            })?;

        if let InventoryAction::RefreshFailed { error, .. } = finished {
            return Err(error);
        }
        Ok(self.store.state(|state| state.records().len()).await)
    }

    /// Apply a mutation optimistically and send it to the remote store
    ///
    /// On success the cache already reflects the change; the returned
    /// subscription reports how it settles.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::Validation`]: refused locally; nothing changed and
    ///   nothing was sent
    /// - [`InventoryError::ShuttingDown`]: the engine no longer accepts mutations
    pub async fn submit(&self, mutation: Mutation) -> Result<Subscription, InventoryError> {
        let mutation_id = MutationId::new();
        let actions = self.store.subscribe_actions();

        self.store
            .send(InventoryAction::Submit {
                id: mutation_id,
                mutation,
            })
            .await?;

        let rejected = self
            .store
            .state(|state| state.rejection(mutation_id).map(|rejection| rejection.error.clone()))
            .await;
        if let Some(error) = rejected {
            return Err(InventoryError::Validation(error));
        }

        Ok(Subscription {
            mutation_id,
            applied_sent: false,
            finished: false,
            actions,
        })
    }

    /// The visible items, filtered and sorted
    pub async fn current_view(&self, filter: &ViewFilter, sort: ViewSort) -> Vec<InventoryItem> {
        let premium = &self.config.premium_categories;
        self.store
            .state(|state| project(state.records(), filter, sort, premium))
            .await
    }

    /// Totals over the visible items
    pub async fn current_aggregate(&self) -> AggregateSnapshot {
        self.store.state(InventoryState::aggregate).await
    }

    /// One visible item
    pub async fn get(&self, id: &ItemId) -> Option<InventoryItem> {
        self.store
            .state(|state| {
                let records = state.records();
                if records.is_hidden(id) {
                    return None;
                }
                records.get(id).cloned()
            })
            .await
    }

    /// Whether a mutation of `id` is waiting for the remote store
    pub async fn is_pending(&self, id: &ItemId) -> bool {
        self.store.state(|state| state.is_pending(id)).await
    }

    /// Number of mutations waiting for the remote store
    pub async fn pending_count(&self) -> usize {
        self.store.state(InventoryState::pending_count).await
    }

    /// Recent local rejections, oldest first
    pub async fn recent_rejections(&self) -> Vec<Rejection> {
        self.store
            .state(|state| state.rejections().iter().cloned().collect())
            .await
    }

    /// Rolled-back mutations from now on, for user notifications
    pub fn rollbacks(&self) -> impl Stream<Item = Notice> + Send + 'static {
        let mut actions = self.store.subscribe_actions();
        async_stream::stream! {
            loop {
                match actions.recv().await {
                    Ok(InventoryAction::RolledBack(notice)) => yield notice,
                    Ok(_) => {},
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Rollback subscriber lagged");
                    },
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Every reconciled action from now on
    ///
    /// Published after the cache has been updated, so reading the engine on
    /// receipt shows the new state.
    #[must_use]
    pub fn subscribe_changes(&self) -> broadcast::Receiver<InventoryAction> {
        self.store.subscribe_actions()
    }

    /// Health of the cache
    ///
    /// Degraded while refreshes are failing or conflicted items wait for fresh
    /// data; unhealthy after repeated refresh failures.
    pub async fn health(&self) -> HealthCheck {
        self.store
            .state(|state| {
                let refresh = state.refresh();
                let failures = refresh.consecutive_failures();
                let blocked = state.awaiting_refresh_count();

                let status = if failures >= UNHEALTHY_AFTER_FAILURES {
                    HealthStatus::Unhealthy
                } else if failures > 0 || blocked > 0 {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                };

                let last_refresh = refresh
                    .last_loaded_at()
                    .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());

                let check = HealthCheck::new("inventory", status)
                    .with_metadata("cached_items", state.records().len().to_string())
                    .with_metadata("in_flight_mutations", state.pending_count().to_string())
                    .with_metadata("awaiting_refresh", blocked.to_string())
                    .with_metadata("last_refresh", last_refresh);

                match refresh.last_error() {
                    Some(error) => check.with_message(format!("last refresh failed: {error}")),
                    None => check,
                }
            })
            .await
    }

    /// Whether [`shutdown`](Self::shutdown) has begun
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.store.is_shutting_down()
    }

    /// Stop accepting mutations and wait for in-flight remote calls to settle
    ///
    /// Results of calls already running are still reconciled.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Transient`] if calls are still running after
    /// `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), InventoryError> {
        tracing::info!(?timeout, "Shutting down inventory engine");
        self.store.shutdown(timeout).await.map_err(InventoryError::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::mocks::MockTransport;
    use crate::types::{NewItem, StockAdjustment};
    use futures::StreamExt;
    use stockroom_testing::{test_clock, ManualClock};

    fn engine(transport: &MockTransport) -> InventoryEngine {
        InventoryEngine::new(
            Arc::new(transport.clone()),
            EngineConfig::default().with_refresh_delay(Duration::from_millis(20)),
        )
    }

    #[tokio::test]
    async fn subscription_reports_applied_then_confirmed() {
        let remote = MockTransport::with_items([InventoryItem::from_new(
            ItemId::new("jam"),
            NewItem::new("Jam").with_quantity(4),
        )]);
        let engine = engine(&remote);
        engine.load().await.unwrap();

        let subscription = engine
            .submit(Mutation::AdjustStock(StockAdjustment::import("jam", 2)))
            .await
            .unwrap();
        let events: Vec<_> = subscription.into_stream().collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], MutationEvent::Applied);
        assert!(matches!(
            &events[1],
            MutationEvent::Confirmed(RemoteOutcome::Item(item)) if item.quantity == 6
        ));
    }

    #[tokio::test]
    async fn health_reports_cache_metadata() {
        let remote = MockTransport::new();
        let engine = engine(&remote);

        let before = engine.health().await;
        assert_eq!(before.status, HealthStatus::Healthy);
        assert_eq!(before.metadata_value("last_refresh"), Some("never"));

        engine.load().await.unwrap();
        let after = engine.health().await;
        assert_eq!(after.metadata_value("cached_items"), Some("0"));
        assert_ne!(after.metadata_value("last_refresh"), Some("never"));
    }

    #[tokio::test]
    async fn last_refresh_comes_from_the_clock() {
        let clock = ManualClock::new(test_clock().now());
        clock.advance(chrono::Duration::minutes(5));
        let engine = InventoryEngine::with_clock(
            Arc::new(MockTransport::new()),
            Arc::new(clock.clone()),
            EngineConfig::default(),
        );

        engine.load().await.unwrap();

        let health = engine.health().await;
        assert_eq!(
            health.metadata_value("last_refresh"),
            Some("2025-01-01T00:05:00+00:00")
        );
    }
}
