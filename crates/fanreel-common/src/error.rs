//! Error types for FanReel

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service-boundary error taxonomy
///
/// Every public service method resolves to one of these kinds. Callers
/// receive a stable kind plus a human-readable message; internal error
/// shapes from the store or the payment processor never cross the
/// boundary unclassified.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum MarketError {
    /// Missing or malformed input, naming the offending field
    #[error("invalid {field}: {message}")]
    Validation {
        /// The input field that failed the check
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// Actor not permitted to perform the operation
    #[error("not permitted: {0}")]
    Authorization(String),

    /// Status transition not in the allowed table, or lost race
    #[error("illegal transition: {from} -> {to}")]
    StateTransition {
        /// Status the order was in
        from: String,
        /// Status the actor attempted to reach
        to: String,
    },

    /// Entity absent, or access intentionally not disclosed
    #[error("not found: {0}")]
    NotFound(String),

    /// Payment processor call failed
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// Transient connectivity failure to the store or transport
    #[error("network error: {0}")]
    Network(String),
}

impl MarketError {
    /// Build a validation failure for a named field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Default classification of a store failure
    ///
    /// For call sites that have already matched the conflicts they care
    /// about; a conflict reaching this point is reported as a transient
    /// infrastructure problem.
    pub fn from_store(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(m) => Self::NotFound(m),
            StoreError::Conflict(m) | StoreError::Unavailable(m) => Self::Network(m),
        }
    }
}

/// Result type for FanReel service methods
pub type MarketResult<T> = Result<T, MarketError>;

/// Storage adapter errors
///
/// Classified once at the adapter boundary; service logic maps these to
/// the taxonomy per call site (a `Conflict` means different things to a
/// webhook insert and to a conditional status update).
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Row absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or compare-and-swap violation
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend unreachable or failing
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage adapters
pub type StoreResult<T> = Result<T, StoreError>;
