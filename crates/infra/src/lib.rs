//! Infrastructure layer: engine orchestration, storage, locking, config.
//!
//! Domain crates stay pure; this crate wires them into atomic operations
//! behind [`InventoryEngine`].

pub mod accounts;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod locks;
pub mod services;
pub mod store;

pub use accounts::{AccountResolver, ChartAccountResolver};
pub use config::{EngineConfig, LogFormat};
pub use engine::{InventoryEngine, ReorderAlert};
pub use error::{EngineError, EngineResult, StoreError};
pub use events::LedgerEvent;
pub use services::movements::MovementOutcome;
pub use store::{ChangeSet, InMemoryLedgerStore, InMemoryRateTable, LedgerRepository, UnitOfWork};
