//! Accounting module (double-entry journal, chart of accounts, exchange rates).
//!
//! Pure domain logic only: no IO, no locking, no persistence concerns.

pub mod account;
pub mod error;
pub mod exchange;
pub mod journal;

pub use account::{Account, AccountCode, AccountKind, AccountRole, ChartOfAccounts, Side};
pub use error::{AccountingError, AccountingResult};
pub use exchange::{Conversion, ExchangeRate, ExchangeRateResolver, ExchangeRateSource};
pub use journal::{
    ForeignAmount, JournalEntry, JournalEvent, JournalLine, JournalLineRequest, JournalPosted,
    JournalStatus, PostJournalEntry,
};
