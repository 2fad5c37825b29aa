//! Persistence contract for the ledger.
//!
//! Reads go straight to a [`LedgerRepository`]. Writes are staged in a
//! [`UnitOfWork`], turned into a [`ChangeSet`] and applied with a single
//! [`LedgerRepository::commit`]. Dropping a unit of work is a rollback.

pub mod in_memory;
pub mod rates;
pub mod unit_of_work;

use std::sync::Arc;

use stockledger_accounting::JournalEntry;
use stockledger_core::{ExpectedVersion, ItemId, LocationId, TransferId};
use stockledger_inventory::{InventoryBalance, Item, Location, StockLot, StockMovement, StockTransfer};

use crate::error::StoreError;

pub use in_memory::InMemoryLedgerStore;
pub use rates::InMemoryRateTable;
pub use unit_of_work::UnitOfWork;

/// A record written together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staged<T> {
    pub record: T,
    pub expected: ExpectedVersion,
}

/// Everything one operation writes, applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub balances: Vec<Staged<InventoryBalance>>,
    /// New lots and every lot loaded for allocation (upserted by id).
    pub lots: Vec<StockLot>,
    pub movements: Vec<StockMovement>,
    pub journal_entries: Vec<JournalEntry>,
    pub transfers: Vec<Staged<StockTransfer>>,
    /// Number of domain events the commit publishes; the store reserves a
    /// contiguous sequence range for them.
    pub event_count: u64,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
            && self.lots.is_empty()
            && self.movements.is_empty()
            && self.journal_entries.is_empty()
            && self.transfers.is_empty()
    }
}

/// Returned by a successful commit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Store-wide commit counter.
    pub commit: u64,
    /// Sequence number of the first event in this commit.
    pub first_event_sequence: u64,
}

/// Ledger storage.
///
/// Implementations must apply a [`ChangeSet`] all-or-nothing and reject it
/// with [`StoreError::Conflict`] when any staged balance or transfer no
/// longer matches its expected version.
pub trait LedgerRepository: Send + Sync {
    fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    fn items(&self) -> Result<Vec<Item>, StoreError>;

    fn location(&self, id: LocationId) -> Result<Option<Location>, StoreError>;

    fn balance(&self, location: LocationId, item: ItemId) -> Result<Option<InventoryBalance>, StoreError>;

    /// Every balance written at the location.
    fn balances_at(&self, location: LocationId) -> Result<Vec<InventoryBalance>, StoreError>;

    /// Every lot for the key, exhausted ones included.
    fn lots(&self, location: LocationId, item: ItemId) -> Result<Vec<StockLot>, StoreError>;

    /// Next lot creation number (monotonic; gaps allowed).
    fn next_lot_sequence(&self) -> Result<u64, StoreError>;

    /// Movements for the key in commit order.
    fn movements(&self, location: LocationId, item: ItemId) -> Result<Vec<StockMovement>, StoreError>;

    fn transfer(&self, id: TransferId) -> Result<Option<StockTransfer>, StoreError>;

    fn journal_entries_by_reference(&self, reference: &str) -> Result<Vec<JournalEntry>, StoreError>;

    /// All posted entries in commit order.
    fn journal_entries(&self) -> Result<Vec<JournalEntry>, StoreError>;

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError>;
}

impl<R> LedgerRepository for Arc<R>
where
    R: LedgerRepository + ?Sized,
{
    fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        (**self).item(id)
    }

    fn items(&self) -> Result<Vec<Item>, StoreError> {
        (**self).items()
    }

    fn location(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        (**self).location(id)
    }

    fn balance(&self, location: LocationId, item: ItemId) -> Result<Option<InventoryBalance>, StoreError> {
        (**self).balance(location, item)
    }

    fn balances_at(&self, location: LocationId) -> Result<Vec<InventoryBalance>, StoreError> {
        (**self).balances_at(location)
    }

    fn lots(&self, location: LocationId, item: ItemId) -> Result<Vec<StockLot>, StoreError> {
        (**self).lots(location, item)
    }

    fn next_lot_sequence(&self) -> Result<u64, StoreError> {
        (**self).next_lot_sequence()
    }

    fn movements(&self, location: LocationId, item: ItemId) -> Result<Vec<StockMovement>, StoreError> {
        (**self).movements(location, item)
    }

    fn transfer(&self, id: TransferId) -> Result<Option<StockTransfer>, StoreError> {
        (**self).transfer(id)
    }

    fn journal_entries_by_reference(&self, reference: &str) -> Result<Vec<JournalEntry>, StoreError> {
        (**self).journal_entries_by_reference(reference)
    }

    fn journal_entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        (**self).journal_entries()
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError> {
        (**self).commit(changes)
    }
}
