//! Inventory metrics.
//!
//! Recorded through the `metrics` facade; nothing is collected unless the host
//! installs a recorder (see `stockroom_runtime::metrics::PrometheusMetrics`).

use crate::types::MutationKind;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Register descriptions for the inventory metrics
pub fn register_metrics() {
    describe_counter!(
        "inventory.mutations.submitted",
        "Mutations applied optimistically and sent to the remote store"
    );
    describe_counter!(
        "inventory.mutations.rejected",
        "Mutations refused locally before any remote call"
    );
    describe_counter!(
        "inventory.mutations.confirmed",
        "Mutations confirmed by the remote store"
    );
    describe_counter!(
        "inventory.mutations.rolled_back",
        "Mutations rolled back after a remote failure"
    );
    describe_histogram!(
        "inventory.mutation.latency_seconds",
        "Time from optimistic apply to reconciliation"
    );
    describe_counter!("inventory.refresh.completed", "Refreshes that loaded");
    describe_counter!("inventory.refresh.failed", "Refreshes that failed after retries");
    describe_counter!(
        "inventory.aggregate.drift",
        "Refreshes that found local totals diverging from the remote store"
    );
    describe_gauge!("inventory.items.cached", "Items held in the cache");
}

/// Inventory metrics recorder.
pub struct InventoryMetrics;

impl InventoryMetrics {
    /// Record a mutation sent to the remote store.
    pub fn record_submitted(kind: MutationKind) {
        counter!("inventory.mutations.submitted", "kind" => kind.as_str()).increment(1);
    }

    /// Record a local rejection.
    pub fn record_rejected(kind: MutationKind) {
        counter!("inventory.mutations.rejected", "kind" => kind.as_str()).increment(1);
    }

    /// Record a confirmation.
    pub fn record_confirmed(kind: MutationKind, latency: Duration) {
        counter!("inventory.mutations.confirmed", "kind" => kind.as_str()).increment(1);
        histogram!("inventory.mutation.latency_seconds", "outcome" => "confirmed")
            .record(latency.as_secs_f64());
    }

    /// Record a rollback.
    pub fn record_rolled_back(kind: MutationKind, error: &'static str, latency: Duration) {
        counter!(
            "inventory.mutations.rolled_back",
            "kind" => kind.as_str(),
            "error" => error
        )
        .increment(1);
        histogram!("inventory.mutation.latency_seconds", "outcome" => "rolled_back")
            .record(latency.as_secs_f64());
    }

    /// Record a loaded refresh.
    pub fn record_refresh_completed() {
        counter!("inventory.refresh.completed").increment(1);
    }

    /// Record a failed refresh.
    pub fn record_refresh_failed() {
        counter!("inventory.refresh.failed").increment(1);
    }

    /// Record detected drift.
    pub fn record_drift() {
        counter!("inventory.aggregate.drift").increment(1);
    }

    /// Record the cache size.
    #[allow(clippy::cast_precision_loss)] // item counts are far below 2^52
    pub fn record_cached_items(count: usize) {
        gauge!("inventory.items.cached").set(count as f64);
    }
}
