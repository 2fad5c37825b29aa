//! Staging area for one atomic operation.

use std::collections::BTreeMap;

use stockledger_accounting::JournalEntry;
use stockledger_core::{ExpectedVersion, ItemId, LocationId, TransferId};
use stockledger_inventory::{InventoryBalance, StockLot, StockMovement, StockTransfer};

use super::{ChangeSet, LedgerRepository, Staged};
use crate::error::StoreError;
use crate::events::LedgerEvent;
use crate::locks::StockKey;

/// Overlay over a [`LedgerRepository`].
///
/// Reads through the unit of work see its own staged writes, so a transfer
/// shipping two lines of the same item allocates against lots already
/// consumed by the first line. Nothing reaches the repository until
/// [`UnitOfWork::finish`] hands the [`ChangeSet`] to `commit`.
pub struct UnitOfWork<'r, R: LedgerRepository + ?Sized> {
    repo: &'r R,
    balances: BTreeMap<StockKey, Staged<InventoryBalance>>,
    lots: BTreeMap<StockKey, Vec<StockLot>>,
    movements: Vec<StockMovement>,
    journal_entries: Vec<JournalEntry>,
    transfers: BTreeMap<TransferId, Staged<StockTransfer>>,
    events: Vec<LedgerEvent>,
}

impl<'r, R: LedgerRepository + ?Sized> UnitOfWork<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self {
            repo,
            balances: BTreeMap::new(),
            lots: BTreeMap::new(),
            movements: Vec::new(),
            journal_entries: Vec::new(),
            transfers: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn repo(&self) -> &'r R {
        self.repo
    }

    /// Balance for the key, loaded on first access (zero balance if none).
    pub fn balance_mut(&mut self, location: LocationId, item: ItemId) -> Result<&mut InventoryBalance, StoreError> {
        let key = (location, item);
        if !self.balances.contains_key(&key) {
            let staged = match self.repo.balance(location, item)? {
                Some(b) => {
                    let expected = ExpectedVersion::Exact(b.version);
                    Staged { record: b, expected }
                }
                None => Staged {
                    record: InventoryBalance::empty(location, item),
                    expected: ExpectedVersion::New,
                },
            };
            self.balances.insert(key, staged);
        }
        self.balances
            .get_mut(&key)
            .map(|s| &mut s.record)
            .ok_or_else(|| StoreError::InvalidChangeSet("balance vanished from unit of work".into()))
    }

    /// Lots for the key (all of them), loaded on first access.
    pub fn lots_mut(&mut self, location: LocationId, item: ItemId) -> Result<&mut Vec<StockLot>, StoreError> {
        let key = (location, item);
        if !self.lots.contains_key(&key) {
            let lots = self.repo.lots(location, item)?;
            self.lots.insert(key, lots);
        }
        self.lots
            .get_mut(&key)
            .ok_or_else(|| StoreError::InvalidChangeSet("lots vanished from unit of work".into()))
    }

    pub fn add_lot(&mut self, lot: StockLot) -> Result<(), StoreError> {
        self.lots_mut(lot.location_id, lot.item_id)?.push(lot);
        Ok(())
    }

    /// Transfer as currently staged, falling back to the repository.
    pub fn transfer(&self, id: TransferId) -> Result<Option<StockTransfer>, StoreError> {
        match self.transfers.get(&id) {
            Some(staged) => Ok(Some(staged.record.clone())),
            None => self.repo.transfer(id),
        }
    }

    /// Stage a transfer write. `read_version` is the version it was loaded
    /// at (`None` for a new transfer); restaging keeps the first expectation.
    pub fn stage_transfer(&mut self, transfer: StockTransfer, read_version: Option<u64>) {
        let id = transfer.id_typed();
        match self.transfers.get_mut(&id) {
            Some(staged) => staged.record = transfer,
            None => {
                let expected = match read_version {
                    Some(v) => ExpectedVersion::Exact(v),
                    None => ExpectedVersion::New,
                };
                self.transfers.insert(id, Staged { record: transfer, expected });
            }
        }
    }

    pub fn record_movement(&mut self, movement: StockMovement) {
        self.movements.push(movement);
    }

    pub fn record_journal_entry(&mut self, entry: JournalEntry) {
        self.journal_entries.push(entry);
    }

    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Close the unit of work: the change set to commit and the events to
    /// publish once it is committed.
    pub fn finish(self) -> (ChangeSet, Vec<LedgerEvent>) {
        let balances = self
            .balances
            .into_values()
            .filter(|s| is_dirty(s.expected, s.record.version))
            .collect();

        // Lots loaded through `lots_mut` are written back whole.
        let lots = self.lots.into_values().flatten().collect();

        let changes = ChangeSet {
            balances,
            lots,
            movements: self.movements,
            journal_entries: self.journal_entries,
            transfers: self.transfers.into_values().collect(),
            event_count: self.events.len() as u64,
        };
        (changes, self.events)
    }
}

fn is_dirty(expected: ExpectedVersion, current: u64) -> bool {
    match expected {
        ExpectedVersion::Exact(v) => v != current,
        ExpectedVersion::New => current > 0,
        ExpectedVersion::Any => true,
    }
}
