//! Reducer for the inventory cache.
//!
//! Every write to the cache happens here, synchronously, in the order actions
//! reach the store:
//!
//! - `Submit` validates and applies a mutation optimistically, then issues the
//!   remote call as an effect
//! - `RemoteSucceeded` / `RemoteFailed` confirm or roll back exactly that mutation
//! - `RequestRefresh`, `RefreshLoaded` and `RefreshFailed` drive the background
//!   refresh that corrects drift
//!
//! A refresh replaces the cache with authoritative data and then re-applies every
//! mutation still in flight, in submission order, so optimistic changes survive
//! it and their restore points describe the fresh data.
//!
//! Mutations on the same item are not serialized. If two adjustments of one item
//! are in flight and one fails, its rollback restores the quantity it captured and
//! so also drops the other's optimistic delta. When that can have happened, the
//! rollback schedules a corrective refresh.

use crate::aggregate::AggregateSnapshot;
use crate::applier::{self, RestorePoint};
use crate::config::EngineConfig;
use crate::environment::InventoryEnvironment;
use crate::error::{InventoryError, TransportError, ValidationError};
use crate::projection::ViewFilter;
use crate::reconciler::{self, RemoteOutcome};
use crate::record_store::RecordStore;
use crate::scheduler::{RefreshDecision, RefreshReason, RefreshScheduler};
use crate::telemetry::InventoryMetrics;
use crate::types::{InventoryItem, ItemId, Mutation, MutationId};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use stockroom_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use stockroom_runtime::retry::retry_with_backoff;

type Effects = SmallVec<[Effect<InventoryAction>; 4]>;

/// A mutation applied optimistically and waiting for the remote store
#[derive(Debug, Clone)]
pub struct PendingMutation {
    /// The mutation as submitted
    pub mutation: Mutation,
    /// What to restore if it fails
    pub restore: RestorePoint,
    /// When it was applied
    pub submitted_at: DateTime<Utc>,
    sequence: u64,
}

/// A rolled-back mutation, for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// The failed mutation
    pub mutation_id: MutationId,
    /// What it tried to do
    pub operation: String,
    /// Why it failed
    pub error: InventoryError,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.error)
    }
}

/// A mutation refused before any remote call
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// The refused mutation
    pub mutation_id: MutationId,
    /// What it tried to do
    pub operation: String,
    /// Why it was refused
    pub error: ValidationError,
    /// When
    pub at: DateTime<Utc>,
}

/// State of the inventory cache
///
/// Read-only outside this module: every change goes through
/// [`InventoryReducer`].
#[derive(Debug, Clone, Default)]
pub struct InventoryState {
    records: RecordStore,
    aggregate: AggregateSnapshot,
    pending: HashMap<MutationId, PendingMutation>,
    awaiting_refresh: HashMap<ItemId, u64>,
    refresh: RefreshScheduler,
    rejections: VecDeque<Rejection>,
    next_sequence: u64,
}

impl InventoryState {
    /// An empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache preloaded with `items`
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        let records = RecordStore::from_items(items);
        let aggregate = AggregateSnapshot::from_store(&records);
        Self {
            records,
            aggregate,
            ..Self::default()
        }
    }

    /// The cached items
    #[must_use]
    pub const fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Current totals over the visible items
    #[must_use]
    pub const fn aggregate(&self) -> AggregateSnapshot {
        self.aggregate
    }

    /// Refresh scheduling state
    #[must_use]
    pub const fn refresh(&self) -> &RefreshScheduler {
        &self.refresh
    }

    /// Mutations waiting for the remote store
    pub fn pending(&self) -> impl Iterator<Item = (&MutationId, &PendingMutation)> {
        self.pending.iter()
    }

    /// Number of mutations waiting for the remote store
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether any in-flight mutation targets `id`
    #[must_use]
    pub fn is_pending(&self, id: &ItemId) -> bool {
        self.pending
            .values()
            .any(|pending| pending.mutation.target() == Some(id))
    }

    /// Whether `id` is blocked until fresh data arrives
    #[must_use]
    pub fn is_awaiting_refresh(&self, id: &ItemId) -> bool {
        self.awaiting_refresh.contains_key(id)
    }

    /// Number of items blocked until fresh data arrives
    #[must_use]
    pub fn awaiting_refresh_count(&self) -> usize {
        self.awaiting_refresh.len()
    }

    /// Recent local rejections, oldest first
    #[must_use]
    pub const fn rejections(&self) -> &VecDeque<Rejection> {
        &self.rejections
    }

    /// The rejection recorded for `mutation_id`, if it was refused
    #[must_use]
    pub fn rejection(&self, mutation_id: MutationId) -> Option<&Rejection> {
        self.rejections
            .iter()
            .rev()
            .find(|rejection| rejection.mutation_id == mutation_id)
    }
}

/// Actions for the inventory cache
#[derive(Debug, Clone)]
pub enum InventoryAction {
    // ========== Commands ==========
    /// Apply a mutation optimistically and send it to the remote store
    Submit {
        /// Caller-assigned id, used to route the result
        id: MutationId,
        /// The change
        mutation: Mutation,
    },

    /// Refetch the authoritative item list
    RequestRefresh {
        /// Why
        reason: RefreshReason,
    },

    // ========== Remote results ==========
    /// The remote store accepted a mutation
    RemoteSucceeded {
        /// The mutation
        id: MutationId,
        /// The remote store's answer
        outcome: RemoteOutcome,
    },

    /// The remote store refused a mutation, or could not be reached
    RemoteFailed {
        /// The mutation
        id: MutationId,
        /// Classified failure
        error: InventoryError,
    },

    /// A refresh fetched the authoritative item list
    RefreshLoaded {
        /// Fetch generation
        generation: u64,
        /// Every item, in remote order
        items: Vec<InventoryItem>,
        /// The remote store's own totals, if they could be fetched
        stats: Option<AggregateSnapshot>,
    },

    /// A refresh failed after retries
    RefreshFailed {
        /// Fetch generation
        generation: u64,
        /// Classified failure
        error: InventoryError,
    },

    // ========== Notifications ==========
    /// A mutation was rolled back; published for toasts, changes no state
    RolledBack(Notice),
}

/// Reducer for the inventory cache
#[derive(Clone, Debug, Default)]
pub struct InventoryReducer {
    config: EngineConfig,
}

impl InventoryReducer {
    /// Creates a new `InventoryReducer`
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The configuration in use
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn submit(
        &self,
        state: &mut InventoryState,
        env: &InventoryEnvironment,
        id: MutationId,
        mutation: Mutation,
    ) -> Effects {
        if state.pending.contains_key(&id) {
            tracing::warn!(mutation_id = %id, "Duplicate submission ignored");
            return SmallVec::new();
        }

        let blocked = mutation
            .target()
            .filter(|target| state.awaiting_refresh.contains_key(*target))
            .cloned();
        let applied = match blocked {
            Some(target) => Err(ValidationError::AwaitingRefresh { id: target }),
            None => applier::apply(&mut state.records, &mut state.aggregate, &mutation),
        };

        let restore = match applied {
            Ok(restore) => restore,
            Err(error) => {
                self.reject(state, env, id, &mutation, error);
                return SmallVec::new();
            },
        };

        InventoryMetrics::record_submitted(mutation.kind());
        let call = Self::remote_call(env, id, mutation.clone());
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.pending.insert(
            id,
            PendingMutation {
                mutation,
                restore,
                submitted_at: env.clock.now(),
                sequence,
            },
        );
        smallvec![call]
    }

    fn reject(
        &self,
        state: &mut InventoryState,
        env: &InventoryEnvironment,
        mutation_id: MutationId,
        mutation: &Mutation,
        error: ValidationError,
    ) {
        let operation = mutation.describe();
        tracing::info!(%mutation_id, %operation, %error, "Mutation rejected");
        InventoryMetrics::record_rejected(mutation.kind());

        // At least one entry, so the submitter can always find its own rejection.
        let capacity = self.config.rejection_history.max(1);
        while state.rejections.len() >= capacity {
            state.rejections.pop_front();
        }
        state.rejections.push_back(Rejection {
            mutation_id,
            operation,
            error,
            at: env.clock.now(),
        });
    }

    fn remote_call(
        env: &InventoryEnvironment,
        mutation_id: MutationId,
        mutation: Mutation,
    ) -> Effect<InventoryAction> {
        let transport = Arc::clone(&env.transport);
        Effect::future(async move {
            let result = match mutation {
                Mutation::Create(new) => transport.create_item(new).await.map(RemoteOutcome::Item),
                Mutation::Update { id, patch } => transport
                    .update_item(id, patch)
                    .await
                    .map(RemoteOutcome::Item),
                Mutation::Delete { id } => transport
                    .delete_item(id.clone())
                    .await
                    .map(|()| RemoteOutcome::Deleted(id)),
                Mutation::AdjustStock(adjustment) => transport
                    .adjust_stock(adjustment)
                    .await
                    .map(RemoteOutcome::Item),
            };

            Some(match result {
                Ok(outcome) => InventoryAction::RemoteSucceeded {
                    id: mutation_id,
                    outcome,
                },
                Err(error) => InventoryAction::RemoteFailed {
                    id: mutation_id,
                    error: error.into(),
                },
            })
        })
    }

    fn on_succeeded(
        &self,
        state: &mut InventoryState,
        env: &InventoryEnvironment,
        id: MutationId,
        outcome: &RemoteOutcome,
    ) -> Effects {
        let Some(pending) = state.pending.remove(&id) else {
            tracing::debug!(mutation_id = %id, "Ignoring result for settled mutation");
            return SmallVec::new();
        };

        let merge = reconciler::confirm(
            &mut state.records,
            &mut state.aggregate,
            &pending.mutation,
            outcome,
        );
        tracing::debug!(
            mutation_id = %id,
            operation = %pending.mutation.describe(),
            ?merge,
            "Mutation confirmed"
        );
        InventoryMetrics::record_confirmed(pending.mutation.kind(), latency(env, &pending));
        InventoryMetrics::record_cached_items(state.records.len());

        let mut effects = SmallVec::new();
        self.schedule_refresh(state, self.config.refresh_delay, &mut effects);
        effects
    }

    fn on_failed(
        &self,
        state: &mut InventoryState,
        env: &InventoryEnvironment,
        id: MutationId,
        error: InventoryError,
    ) -> Effects {
        let Some(pending) = state.pending.remove(&id) else {
            tracing::debug!(mutation_id = %id, "Ignoring failure for settled mutation");
            return SmallVec::new();
        };

        let kind = pending.mutation.kind();
        let operation = pending.mutation.describe();
        let target = pending.mutation.target().cloned();
        let elapsed = latency(env, &pending);

        let restored = reconciler::rollback(&mut state.records, &mut state.aggregate, pending.restore);
        tracing::warn!(
            mutation_id = %id,
            %operation,
            %error,
            restored,
            "Mutation rolled back"
        );
        InventoryMetrics::record_rolled_back(kind, error.kind(), elapsed);
        InventoryMetrics::record_cached_items(state.records.len());

        let mut effects: Effects = smallvec![Self::notify(Notice {
            mutation_id: id,
            operation,
            error: error.clone(),
        })];

        let Some(target) = target else {
            return effects;
        };

        if error.requires_refresh() {
            let required = state.refresh.upcoming_generation();
            tracing::warn!(id = %target, required, "Conflict; item blocked until refreshed");
            state.awaiting_refresh.insert(target, required);
            effects.extend(self.request_refresh(state, env, RefreshReason::Forced));
        } else if restored && state.is_pending(&target) {
            tracing::debug!(id = %target, "Rollback may have erased other changes; refreshing");
            self.schedule_refresh(state, self.config.refresh_delay, &mut effects);
        }

        effects
    }

    fn notify(notice: Notice) -> Effect<InventoryAction> {
        Effect::future(async move { Some(InventoryAction::RolledBack(notice)) })
    }

    fn schedule_refresh(&self, state: &mut InventoryState, delay: Duration, effects: &mut Effects) {
        if state.refresh.schedule() {
            effects.push(Effect::delay(
                delay,
                InventoryAction::RequestRefresh {
                    reason: RefreshReason::Scheduled,
                },
            ));
        }
    }

    fn request_refresh(
        &self,
        state: &mut InventoryState,
        env: &InventoryEnvironment,
        reason: RefreshReason,
    ) -> Effects {
        match state.refresh.request(reason) {
            RefreshDecision::Start(generation) => {
                tracing::debug!(generation, reason = reason.as_str(), "Starting refresh");
                smallvec![self.fetch(env, generation)]
            },
            RefreshDecision::Coalesced => {
                tracing::debug!(reason = reason.as_str(), "Refresh already running; will rerun");
                SmallVec::new()
            },
        }
    }

    fn fetch(&self, env: &InventoryEnvironment, generation: u64) -> Effect<InventoryAction> {
        let transport = Arc::clone(&env.transport);
        let policy = self.config.refresh_retry.clone();

        Effect::future(async move {
            let items = retry_with_backoff(
                &policy,
                || transport.fetch_all(ViewFilter::All),
                TransportError::is_retryable,
            );
            let (items, stats) = tokio::join!(items, transport.fetch_stats());

            Some(match items {
                Ok(items) => InventoryAction::RefreshLoaded {
                    generation,
                    items,
                    stats: stats
                        .map_err(|error| tracing::debug!(%error, "Remote totals unavailable"))
                        .ok(),
                },
                Err(error) => InventoryAction::RefreshFailed {
                    generation,
                    error: error.into(),
                },
            })
        })
    }

    fn on_refresh_loaded(
        &self,
        state: &mut InventoryState,
        env: &InventoryEnvironment,
        generation: u64,
        items: Vec<InventoryItem>,
        stats: Option<AggregateSnapshot>,
    ) -> Effects {
        if state.refresh.in_flight() != Some(generation) {
            tracing::debug!(generation, "Ignoring stale refresh");
            return SmallVec::new();
        }

        let previous = state.aggregate;
        let first_load = state.refresh.last_loaded_generation().is_none();
        let settled = state.pending.is_empty();

        state.records.replace_all(items);
        state.aggregate = AggregateSnapshot::from_store(&state.records);
        Self::rebase_pending(state);
        state
            .awaiting_refresh
            .retain(|_, required| *required > generation);

        if settled && !first_load {
            let reference = stats.unwrap_or(state.aggregate);
            if previous.diverges_from(&reference, self.config.drift_tolerance) {
                tracing::warn!(?previous, ?reference, "Local totals drifted from the remote store");
                InventoryMetrics::record_drift();
            }
        }

        let rerun = state.refresh.succeeded(generation, env.clock.now());
        tracing::info!(
            generation,
            items = state.records.len(),
            pending = state.pending.len(),
            "Refresh loaded"
        );
        InventoryMetrics::record_refresh_completed();
        InventoryMetrics::record_cached_items(state.records.len());

        rerun
            .map(|generation| self.fetch(env, generation))
            .into_iter()
            .collect()
    }

    /// Re-apply in-flight mutations on top of freshly loaded data
    ///
    /// Each restore point is recaptured against the new data. A mutation that no
    /// longer applies (its item is gone, or an export now exceeds the stock) keeps
    /// waiting for its remote result with nothing to restore.
    fn rebase_pending(state: &mut InventoryState) {
        let mut order: Vec<(u64, MutationId)> = state
            .pending
            .iter()
            .map(|(id, pending)| (pending.sequence, *id))
            .collect();
        order.sort_unstable_by_key(|(sequence, _)| *sequence);

        for (_, id) in order {
            let Some(pending) = state.pending.get_mut(&id) else {
                continue;
            };
            pending.restore =
                match applier::apply(&mut state.records, &mut state.aggregate, &pending.mutation) {
                    Ok(restore) => restore,
                    Err(error) => {
                        tracing::debug!(
                            mutation_id = %id,
                            %error,
                            "In-flight mutation no longer applies to fresh data"
                        );
                        RestorePoint::Absent
                    },
                };
        }
    }

    fn on_refresh_failed(
        &self,
        state: &mut InventoryState,
        env: &InventoryEnvironment,
        generation: u64,
        error: InventoryError,
    ) -> Effects {
        if state.refresh.in_flight() != Some(generation) {
            tracing::debug!(generation, "Ignoring stale refresh failure");
            return SmallVec::new();
        }

        tracing::warn!(
            generation,
            %error,
            consecutive_failures = state.refresh.consecutive_failures() + 1,
            "Refresh failed"
        );
        InventoryMetrics::record_refresh_failed();

        let mut effects = SmallVec::new();
        match state.refresh.failed(generation, error) {
            Some(rerun) => effects.push(self.fetch(env, rerun)),
            None if !state.awaiting_refresh.is_empty() => {
                // Blocked items must not stay blocked after a failed refresh.
                let backoff = self
                    .config
                    .refresh_retry
                    .base_delay_for_attempt(state.refresh.consecutive_failures() as usize);
                let delay = backoff.max(self.config.refresh_delay);
                self.schedule_refresh(state, delay, &mut effects);
            },
            None => {},
        }
        effects
    }
}

fn latency(env: &InventoryEnvironment, pending: &PendingMutation) -> Duration {
    (env.clock.now() - pending.submitted_at)
        .to_std()
        .unwrap_or_default()
}

impl Reducer for InventoryReducer {
    type State = InventoryState;
    type Action = InventoryAction;
    type Environment = InventoryEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            InventoryAction::Submit { id, mutation } => self.submit(state, env, id, mutation),
            InventoryAction::RequestRefresh { reason } => self.request_refresh(state, env, reason),

            // ========== Remote results ==========
            InventoryAction::RemoteSucceeded { id, outcome } => {
                self.on_succeeded(state, env, id, &outcome)
            },
            InventoryAction::RemoteFailed { id, error } => self.on_failed(state, env, id, error),
            InventoryAction::RefreshLoaded {
                generation,
                items,
                stats,
            } => self.on_refresh_loaded(state, env, generation, items, stats),
            InventoryAction::RefreshFailed { generation, error } => {
                self.on_refresh_failed(state, env, generation, error)
            },

            // ========== Notifications ==========
            InventoryAction::RolledBack(_) => SmallVec::new(),
        }
    }
}
