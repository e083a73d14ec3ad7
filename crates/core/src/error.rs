//! Ledger error model.
//!
//! Every failure the ledger or the session router can report is a variant of
//! [`LedgerError`]. Messages are stable: presentation layers forward them
//! verbatim, so quantity errors carry both the attempted and the limiting
//! numbers.

use thiserror::Error;

/// Result type used across the ledger and session layers.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// An item, warehouse or account does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Input failed validation (non-positive quantity, capacity, short password).
    #[error("{0}")]
    Validation(String),

    /// Duplicate name/alias, delete of a non-empty record, or an already active session.
    #[error("{0}")]
    Conflict(String),

    /// Supplying would push the warehouse over its capacity.
    #[error("warehouse is full: {requested} > {capacity}")]
    CapacityExceeded { requested: i64, capacity: i64 },

    /// The item's aggregate quantity is lower than the requested amount.
    #[error("not enough items: {available} < {requested}")]
    InsufficientItemStock { available: i64, requested: i64 },

    /// The item has never been placed in the warehouse.
    #[error("item not found in specified warehouse")]
    PlacementNotFound,

    /// The warehouse holds fewer units of the item than requested.
    #[error("not enough items in specified warehouse: {available} < {requested}")]
    InsufficientWarehouseStock { available: i64, requested: i64 },

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("user isn't logged in")]
    NotLoggedIn,

    /// Infrastructure failure (database, filesystem, encoding).
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound(entity)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl core::fmt::Display) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Stable machine-readable code, one per variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::InsufficientItemStock { .. } => "insufficient_item_stock",
            Self::PlacementNotFound => "placement_not_found",
            Self::InsufficientWarehouseStock { .. } => "insufficient_warehouse_stock",
            Self::InvalidCredentials => "invalid_credentials",
            Self::NotLoggedIn => "not_logged_in",
            Self::Storage(_) => "storage",
        }
    }
}
