//! Engine configuration.

use crate::projection::PremiumCategories;
use std::time::Duration;
use stockroom_runtime::StoreConfig;
use stockroom_runtime::retry::RetryPolicy;

/// Configuration for an [`InventoryEngine`](crate::engine::InventoryEngine)
///
/// # Example
///
/// ```
/// use stockroom_inventory::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::default()
///     .with_refresh_delay(Duration::from_millis(750))
///     .with_premium_categories(["premium", "reserve"]);
/// assert!(config.premium_categories.contains("Reserve"));
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between a confirmed mutation and the refresh that corrects drift
    pub refresh_delay: Duration,
    /// Retry policy for transient failures while fetching
    pub refresh_retry: RetryPolicy,
    /// How long `load` and `refresh_now` wait for a fetch
    pub load_timeout: Duration,
    /// Categories that mark an item as premium
    pub premium_categories: PremiumCategories,
    /// Number of recent local rejections kept
    pub rejection_history: usize,
    /// Largest difference in floating totals not reported as drift
    pub drift_tolerance: f64,
    /// Configuration of the underlying store
    pub store: StoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_delay: Duration::from_millis(600),
            refresh_retry: RetryPolicy::default(),
            load_timeout: Duration::from_secs(10),
            premium_categories: PremiumCategories::default(),
            rejection_history: 32,
            drift_tolerance: 0.01,
            store: StoreConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set the delay before the post-confirmation refresh
    #[must_use]
    pub const fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Set the retry policy for fetches
    #[must_use]
    pub fn with_refresh_retry(mut self, policy: RetryPolicy) -> Self {
        self.refresh_retry = policy;
        self
    }

    /// Set how long `load` and `refresh_now` wait
    #[must_use]
    pub const fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Set the premium categories
    #[must_use]
    pub fn with_premium_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.premium_categories = PremiumCategories::new(categories);
        self
    }

    /// Set how many local rejections are kept
    #[must_use]
    pub const fn with_rejection_history(mut self, capacity: usize) -> Self {
        self.rejection_history = capacity;
        self
    }

    /// Set the drift tolerance for floating totals
    #[must_use]
    pub const fn with_drift_tolerance(mut self, tolerance: f64) -> Self {
        self.drift_tolerance = tolerance;
        self
    }

    /// Set the underlying store configuration
    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}
