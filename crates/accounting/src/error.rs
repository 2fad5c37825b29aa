use rust_decimal::Decimal;
use thiserror::Error;

use stockledger_core::CurrencyCode;

pub type AccountingResult<T> = Result<T, AccountingError>;

/// Accounting-layer failures. All of them abort the surrounding unit of work.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    /// No active rate for the ordered pair on or before the requested date.
    #[error("no exchange rate from {from} to {to}")]
    MissingExchangeRate { from: CurrencyCode, to: CurrencyCode },

    #[error("journal entry is unbalanced: debit {debit}, credit {credit}")]
    UnbalancedJournal { debit: Decimal, credit: Decimal },
}

impl AccountingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
