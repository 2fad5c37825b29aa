//! Operation logic running inside a [`UnitOfWork`](crate::store::UnitOfWork).
//!
//! Services never lock, commit or publish; the engine does that around them.

pub mod balances;
pub mod journal;
pub mod movements;
pub mod transfers;

use stockledger_accounting::ExchangeRateSource;

use crate::accounts::AccountResolver;
use crate::config::EngineConfig;

/// Read-only collaborators every service needs.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub config: &'a EngineConfig,
    pub accounts: &'a dyn AccountResolver,
    pub rates: &'a dyn ExchangeRateSource,
}
