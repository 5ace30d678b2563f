//! Background refresh scheduling.
//!
//! A pure state machine held in the reducer state. It never sleeps or fetches by
//! itself; the reducer turns its decisions into `Delay` and `Future` effects.
//!
//! Guarantees:
//! - at most one delayed refresh is scheduled at a time
//! - at most one fetch is in flight; a request during a fetch marks a rerun that
//!   starts as soon as the fetch finishes
//! - every fetch gets a generation number, increasing by one per started fetch

use crate::error::InventoryError;
use chrono::{DateTime, Utc};

/// Why a refresh was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// The delay after a confirmed mutation (or a corrective rollback) elapsed
    Scheduled,
    /// A conflict requires fresh data before the item can be edited again
    Forced,
    /// First load of the cache
    Initial,
    /// The user asked for it
    Manual,
}

impl RefreshReason {
    /// Stable label for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Forced => "forced",
            Self::Initial => "initial",
            Self::Manual => "manual",
        }
    }
}

/// What to do with a refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    /// Start a fetch with this generation
    Start(u64),
    /// A fetch is already running; it will be followed by a rerun
    Coalesced,
}

/// Refresh scheduling state
#[derive(Debug, Clone, Default)]
pub struct RefreshScheduler {
    scheduled: bool,
    in_flight: Option<u64>,
    rerun: bool,
    next_generation: u64,
    last_loaded_generation: Option<u64>,
    last_loaded_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    last_error: Option<InventoryError>,
}

impl RefreshScheduler {
    /// A scheduler that has never fetched
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a delayed refresh as scheduled
    ///
    /// Returns `true` if the caller must schedule it; `false` if one is already
    /// pending, in which case the new request coalesces into it.
    pub fn schedule(&mut self) -> bool {
        if self.scheduled {
            return false;
        }
        self.scheduled = true;
        true
    }

    /// Handle a refresh request
    pub fn request(&mut self, reason: RefreshReason) -> RefreshDecision {
        if reason == RefreshReason::Scheduled {
            self.scheduled = false;
        }

        if self.in_flight.is_some() {
            self.rerun = true;
            return RefreshDecision::Coalesced;
        }

        RefreshDecision::Start(self.start())
    }

    /// Generation of the first fetch that will start from now on
    ///
    /// Data from that generation (or later) was fetched after this call.
    #[must_use]
    pub const fn upcoming_generation(&self) -> u64 {
        self.next_generation
    }

    /// Record a completed fetch; results of any other generation are ignored
    ///
    /// Returns the generation of the rerun to start, if one was requested meanwhile.
    pub fn succeeded(&mut self, generation: u64, at: DateTime<Utc>) -> Option<u64> {
        if !self.is_current(generation) {
            return None;
        }
        self.last_loaded_generation = Some(generation);
        self.last_loaded_at = Some(at);
        self.consecutive_failures = 0;
        self.last_error = None;
        self.finish()
    }

    /// Record a failed fetch
    ///
    /// Returns the generation of the rerun to start, if one was requested meanwhile.
    pub fn failed(&mut self, generation: u64, error: InventoryError) -> Option<u64> {
        if !self.is_current(generation) {
            return None;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error);
        self.finish()
    }

    /// Whether a delayed refresh is pending
    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Generation of the running fetch
    #[must_use]
    pub const fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Generation of the last fetch that loaded
    #[must_use]
    pub const fn last_loaded_generation(&self) -> Option<u64> {
        self.last_loaded_generation
    }

    /// When the last fetch loaded
    #[must_use]
    pub const fn last_loaded_at(&self) -> Option<DateTime<Utc>> {
        self.last_loaded_at
    }

    /// Failed fetches since the last one that loaded
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Error of the last fetch, if it failed
    #[must_use]
    pub const fn last_error(&self) -> Option<&InventoryError> {
        self.last_error.as_ref()
    }

    fn start(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.in_flight = Some(generation);
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        let current = self.in_flight == Some(generation);
        if !current {
            tracing::debug!(generation, in_flight = ?self.in_flight, "Stale refresh result");
        }
        current
    }

    fn finish(&mut self) -> Option<u64> {
        self.in_flight = None;

        if self.rerun {
            self.rerun = false;
            return Some(self.start());
        }
        None
    }
}
