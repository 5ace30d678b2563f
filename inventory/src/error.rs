//! Error types for the inventory engine.
//!
//! Transport failures never reach callers raw: they are classified into an
//! [`InventoryError`] kind at the reconciliation boundary. All errors are `Clone`
//! so they can travel inside broadcast actions.

use crate::types::ItemId;
use stockroom_runtime::StoreError;
use thiserror::Error;

/// Failure reported by the transport collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The remote store answered with a non-success status
    #[error("remote store answered {code}: {message}")]
    Status {
        /// HTTP-style status code
        code: u16,
        /// Message from the remote store
        message: String,
    },

    /// The request did not complete in time
    #[error("request timed out")]
    Timeout,

    /// The request could not be delivered
    #[error("network failure: {0}")]
    Network(String),

    /// The response could not be decoded
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Convenience constructor for a status failure
    #[must_use]
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Whether retrying the same request could succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        InventoryError::from(self.clone()).is_retryable()
    }
}

/// A mutation refused before anything was sent, or refused by the remote store as invalid
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Export larger than the stock on hand
    #[error("cannot export {requested} of {id}: only {available} in stock")]
    InsufficientStock {
        /// Target item
        id: ItemId,
        /// Jars requested
        requested: u32,
        /// Jars on hand
        available: u32,
    },

    /// Adjustment of zero jars
    #[error("stock adjustment of {id} must move at least one jar")]
    ZeroAmount {
        /// Target item
        id: ItemId,
    },

    /// Import would overflow the quantity
    #[error("import into {id} would overflow its quantity")]
    QuantityOverflow {
        /// Target item
        id: ItemId,
    },

    /// No cached item with this id
    #[error("unknown item {id}")]
    UnknownItem {
        /// Target item
        id: ItemId,
    },

    /// The item has a delete in flight
    #[error("{id} is being deleted")]
    PendingDelete {
        /// Target item
        id: ItemId,
    },

    /// The item conflicted with the remote store and is waiting for fresh data
    #[error("{id} changed remotely; waiting for refreshed data")]
    AwaitingRefresh {
        /// Target item
        id: ItemId,
    },

    /// A payload field is invalid
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// The remote store rejected the payload
    #[error("rejected by remote store: {0}")]
    Remote(String),
}

/// Error kinds surfaced to the UI
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// The mutation is invalid; nothing was sent, or the remote store refused the payload
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The remote store refused the caller; not retryable
    #[error("permission denied: {0}")]
    Permission(String),

    /// Network, timeout or server failure; the caller may retry with a new mutation
    #[error("temporary failure: {0}")]
    Transient(String),

    /// The remote store's state moved on; the item is refreshed before further edits
    #[error("conflict with remote state: {0}")]
    Conflict(String),

    /// The engine is shutting down and accepts no new mutations
    #[error("inventory engine is shutting down")]
    ShuttingDown,
}

impl InventoryError {
    /// Whether the caller should offer a retry
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether this error forces an immediate refresh of the target item
    #[must_use]
    pub const fn requires_refresh(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Stable label for metrics and logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Permission(_) => "permission",
            Self::Transient(_) => "transient",
            Self::Conflict(_) => "conflict",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

impl From<TransportError> for InventoryError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Status { code, message } => match code {
                401 | 403 => Self::Permission(message),
                404 | 409 | 412 => Self::Conflict(message),
                400 | 422 => Self::Validation(ValidationError::Remote(message)),
                _ => Self::Transient(format!("status {code}: {message}")),
            },
            TransportError::Timeout => Self::Transient("request timed out".to_string()),
            TransportError::Network(reason) => Self::Transient(reason),
            TransportError::Decode(reason) => {
                Self::Transient(format!("undecodable response: {reason}"))
            },
        }
    }
}

impl From<StoreError> for InventoryError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ShutdownInProgress => Self::ShuttingDown,
            other => Self::Transient(other.to_string()),
        }
    }
}
