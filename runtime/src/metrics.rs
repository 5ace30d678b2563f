//! Prometheus metrics for observability and monitoring.
//!
//! The runtime records metrics through the `metrics` facade; nothing is
//! collected until the host application installs a recorder. [`PrometheusMetrics`]
//! installs the Prometheus recorder and hands back a handle the host can render
//! from its own `/metrics` route.
//!
//! # Example
//!
//! ```rust,no_run
//! use stockroom_runtime::metrics::PrometheusMetrics;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::install()?;
//! let exposition = metrics.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installed Prometheus recorder.
pub struct PrometheusMetrics {
    handle: PrometheusHandle,
}

impl PrometheusMetrics {
    /// Install the Prometheus recorder as the global `metrics` recorder and
    /// describe the runtime metrics.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if a global recorder is already installed.
    pub fn install() -> Result<Self, MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = builder
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        register_metrics();
        tracing::info!("Prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Get the underlying handle.
    #[must_use]
    pub const fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render current metrics in Prometheus exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Register descriptions for the metrics the runtime emits.
pub fn register_metrics() {
    describe_counter!("store.commands.total", "Actions reduced by the store");
    describe_counter!(
        "store.effects.executed",
        "Effects started by the store, labelled by effect type"
    );
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time spent inside the reducer per action"
    );
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was shutting down"
    );
    describe_gauge!("store.effects.pending", "Effects currently running");

    describe_counter!("retry.attempt", "Retry attempts after a retryable failure");
    describe_counter!("retry.success", "Operations that succeeded after retrying");
    describe_counter!("retry.exhausted", "Operations that failed after all retries");
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record the number of effects currently running.
    #[allow(clippy::cast_precision_loss)] // effect counts are far below 2^52
    pub fn record_pending(pending: usize) {
        gauge!("store.effects.pending").set(pending as f64);
    }

    /// Record one reducer execution.
    pub fn record_reduction(duration: Duration) {
        counter!("store.commands.total").increment(1);
        histogram!("store.reducer.duration_seconds").record(duration.as_secs_f64());
    }
}
