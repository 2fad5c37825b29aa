//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the inventory and
//! accounting crates (no infrastructure concerns).

pub mod aggregate;
pub mod context;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use context::OperationContext;
pub use error::{DomainError, DomainResult};
pub use id::{ItemId, JournalEntryId, LocationId, LotId, MovementId, TransferId, UserId};
pub use money::{CurrencyCode, Money, BALANCE_TOLERANCE, MONEY_SCALE, UNIT_COST_SCALE};
pub use value_object::ValueObject;
