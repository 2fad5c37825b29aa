//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::{ItemId, LocationId, TransferId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only (validation, invariants, conflicts).
/// Every variant is raised before any state is mutated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. non-positive quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier or code was malformed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Issuing or reserving would drive available stock below zero at a
    /// location that forbids negative stock.
    #[error(
        "insufficient available stock for item {item} at location {location}: requested {requested}, available {available}"
    )]
    InsufficientAvailableStock {
        location: LocationId,
        item: ItemId,
        requested: Decimal,
        available: Decimal,
    },

    /// A transfer workflow action was attempted from the wrong state.
    #[error("transfer {transfer_id} cannot {action} while {status}")]
    InvalidTransferState {
        transfer_id: TransferId,
        status: String,
        action: &'static str,
    },

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
