//! Engine-level error model.
//!
//! Domain crates raise [`DomainError`] / [`AccountingError`]; the store raises
//! [`StoreError`]. Everything reaching a caller of the engine is an
//! [`EngineError`].

use rust_decimal::Decimal;
use thiserror::Error;

use stockledger_accounting::AccountingError;
use stockledger_core::{CurrencyCode, DomainError, ItemId, LocationId, TransferId};

pub type EngineResult<T> = Result<T, EngineError>;

/// Persistence failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency check failed at commit.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,

    /// The change set itself is malformed (duplicate ids and the like).
    #[error("invalid change set: {0}")]
    InvalidChangeSet(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(
        "insufficient available stock for item {item} at location {location}: requested {requested}, available {available}"
    )]
    InsufficientAvailableStock {
        location: LocationId,
        item: ItemId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("transfer {transfer_id} cannot {action} while {status}")]
    InvalidTransferState {
        transfer_id: TransferId,
        status: String,
        action: &'static str,
    },

    #[error("no exchange rate from {from} to {to}")]
    MissingExchangeRate { from: CurrencyCode, to: CurrencyCode },

    #[error("journal entry is unbalanced: debit {debit}, credit {credit}")]
    UnbalancedJournal { debit: Decimal, credit: Decimal },

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),

    /// Publication failed after a successful commit; the ledger state is
    /// already durable.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => EngineError::Validation(msg),
            DomainError::InvariantViolation(msg) => EngineError::InvariantViolation(msg),
            DomainError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DomainError::InsufficientAvailableStock {
                location,
                item,
                requested,
                available,
            } => EngineError::InsufficientAvailableStock {
                location,
                item,
                requested,
                available,
            },
            DomainError::InvalidTransferState {
                transfer_id,
                status,
                action,
            } => EngineError::InvalidTransferState {
                transfer_id,
                status,
                action,
            },
            DomainError::Conflict(msg) => EngineError::Conflict(msg),
        }
    }
}

impl From<AccountingError> for EngineError {
    fn from(value: AccountingError) -> Self {
        match value {
            AccountingError::Validation(msg) => EngineError::Validation(msg),
            AccountingError::UnknownAccount(code) => EngineError::UnknownAccount(code),
            AccountingError::MissingExchangeRate { from, to } => {
                EngineError::MissingExchangeRate { from, to }
            }
            AccountingError::UnbalancedJournal { debit, credit } => {
                EngineError::UnbalancedJournal { debit, credit }
            }
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => EngineError::Conflict(msg),
            other => EngineError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_surface_as_conflicts() {
        let err: EngineError = StoreError::Conflict("balance moved".into()).into();
        assert_eq!(err, EngineError::Conflict("balance moved".into()));

        let err: EngineError = StoreError::Poisoned.into();
        assert!(matches!(err, EngineError::Store(StoreError::Poisoned)));
    }

    #[test]
    fn domain_errors_keep_their_payload() {
        let id = TransferId::new();
        let err: EngineError = DomainError::InvalidTransferState {
            transfer_id: id,
            status: "approved".into(),
            action: "receive",
        }
        .into();
        assert_eq!(
            err.to_string(),
            format!("transfer {id} cannot receive while approved")
        );
    }
}
