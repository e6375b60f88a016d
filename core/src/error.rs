//! Error taxonomy for the reservation core.
//!
//! Faults only. Expected business outcomes (no capacity, oversold, expired,
//! already cancelled) are returned as typed result values from the engine,
//! never as errors. Callers must be able to tell "already done" from
//! "rejected" from "could not be attempted" when deciding whether to retry.

use crate::types::{HoldId, SlotId};
use thiserror::Error;

/// Failures raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-constraint violation on the idempotency key.
    ///
    /// Surfaced as a typed error so the engine can convert the losing side
    /// of a concurrent first-time create into an idempotent replay.
    #[error("idempotency key conflict: {key}")]
    Conflict {
        /// The key that collided.
        key: String,
    },

    /// The backend returned data the domain cannot represent
    /// (e.g. an unknown status string).
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    /// Underlying database or transaction failure.
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Build a [`StoreError::Database`] from any displayable cause.
    pub fn database(cause: impl std::fmt::Display) -> Self {
        Self::Database(cause.to_string())
    }
}

/// Failures raised by the reservation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The referenced slot does not exist.
    #[error("slot {0} not found")]
    SlotNotFound(SlotId),

    /// The referenced hold does not exist.
    #[error("hold {0} not found")]
    HoldNotFound(HoldId),

    /// A store fault; the enclosing transaction was rolled back.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// HTTP status the adapter maps this fault to.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::SlotNotFound(_) | Self::HoldNotFound(_) => 404,
            Self::Store(_) => 500,
        }
    }
}
