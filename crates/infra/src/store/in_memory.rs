use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use stockledger_accounting::JournalEntry;
use stockledger_core::{AggregateRoot, ItemId, JournalEntryId, LocationId, MovementId, TransferId};
use stockledger_inventory::{InventoryBalance, Item, Location, StockLot, StockMovement, StockTransfer};

use super::{ChangeSet, CommitReceipt, LedgerRepository};
use crate::error::StoreError;
use crate::locks::StockKey;

#[derive(Debug, Default)]
struct State {
    items: HashMap<ItemId, Item>,
    locations: HashMap<LocationId, Location>,
    balances: HashMap<StockKey, InventoryBalance>,
    lots: HashMap<StockKey, Vec<StockLot>>,
    movements: Vec<StockMovement>,
    movement_ids: HashSet<MovementId>,
    journal: Vec<JournalEntry>,
    journal_ids: HashSet<JournalEntryId>,
    transfers: HashMap<TransferId, StockTransfer>,
    commits: u64,
    events: u64,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. One `RwLock` guards all state, so a commit is
/// trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
    lot_sequence: AtomicU64,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Administrative item maintenance (catalogue and standard cost).
    pub fn upsert_item(&self, item: Item) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state.items.insert(item.id, item);
        Ok(())
    }

    pub fn upsert_location(&self, location: Location) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state.locations.insert(location.id, location);
        Ok(())
    }

    pub fn commit_count(&self) -> u64 {
        self.state.read().map(|s| s.commits).unwrap_or(0)
    }

    fn check_versions(state: &State, changes: &ChangeSet) -> Result<(), StoreError> {
        for staged in &changes.balances {
            let b = &staged.record;
            let actual = state.balances.get(&(b.location_id, b.item_id)).map(|b| b.version);
            if !staged.expected.matches(actual) {
                return Err(StoreError::Conflict(format!(
                    "balance {}/{}: expected {:?}, found {actual:?}",
                    b.location_id, b.item_id, staged.expected
                )));
            }
        }

        for staged in &changes.transfers {
            let id = staged.record.id_typed();
            let actual = state.transfers.get(&id).map(|t| t.version());
            if !staged.expected.matches(actual) {
                return Err(StoreError::Conflict(format!(
                    "transfer {id}: expected {:?}, found {actual:?}",
                    staged.expected
                )));
            }
        }

        let mut seen = HashSet::new();
        for m in &changes.movements {
            if state.movement_ids.contains(&m.id) || !seen.insert(m.id) {
                return Err(StoreError::InvalidChangeSet(format!("duplicate movement {}", m.id)));
            }
        }
        let mut seen = HashSet::new();
        for e in &changes.journal_entries {
            if state.journal_ids.contains(&e.id) || !seen.insert(e.id) {
                return Err(StoreError::InvalidChangeSet(format!("duplicate journal entry {}", e.id)));
            }
        }
        Ok(())
    }
}

impl LedgerRepository for InMemoryLedgerStore {
    fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.items.get(&id).cloned())
    }

    fn items(&self) -> Result<Vec<Item>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.items.values().cloned().collect())
    }

    fn location(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.locations.get(&id).cloned())
    }

    fn balance(&self, location: LocationId, item: ItemId) -> Result<Option<InventoryBalance>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.balances.get(&(location, item)).cloned())
    }

    fn balances_at(&self, location: LocationId) -> Result<Vec<InventoryBalance>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .balances
            .values()
            .filter(|b| b.location_id == location)
            .cloned()
            .collect())
    }

    fn lots(&self, location: LocationId, item: ItemId) -> Result<Vec<StockLot>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.lots.get(&(location, item)).cloned().unwrap_or_default())
    }

    fn next_lot_sequence(&self) -> Result<u64, StoreError> {
        Ok(self.lot_sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn movements(&self, location: LocationId, item: ItemId) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .movements
            .iter()
            .filter(|m| m.location_id == location && m.item_id == item)
            .cloned()
            .collect())
    }

    fn transfer(&self, id: TransferId) -> Result<Option<StockTransfer>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.transfers.get(&id).cloned())
    }

    fn journal_entries_by_reference(&self, reference: &str) -> Result<Vec<JournalEntry>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .journal
            .iter()
            .filter(|e| e.reference == reference)
            .cloned()
            .collect())
    }

    fn journal_entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.journal.clone())
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        // Validate everything before the first write.
        Self::check_versions(&state, &changes)?;

        for staged in changes.balances {
            let b = staged.record;
            state.balances.insert((b.location_id, b.item_id), b);
        }

        for lot in changes.lots {
            let lots = state.lots.entry((lot.location_id, lot.item_id)).or_default();
            match lots.iter_mut().find(|l| l.id == lot.id) {
                Some(existing) => *existing = lot,
                None => lots.push(lot),
            }
        }

        for m in changes.movements {
            state.movement_ids.insert(m.id);
            state.movements.push(m);
        }

        for e in changes.journal_entries {
            state.journal_ids.insert(e.id);
            state.journal.push(e);
        }

        for staged in changes.transfers {
            let t = staged.record;
            state.transfers.insert(t.id_typed(), t);
        }

        state.commits += 1;
        let first_event_sequence = state.events + 1;
        state.events += changes.event_count;

        Ok(CommitReceipt {
            commit: state.commits,
            first_event_sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Staged;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use stockledger_core::ExpectedVersion;
    use stockledger_inventory::NegativeStockPolicy;

    fn received(item: ItemId, location: LocationId) -> InventoryBalance {
        let mut b = InventoryBalance::empty(location, item);
        b.apply_movement(dec!(10), dec!(2), NegativeStockPolicy::Forbid, Utc::now())
            .unwrap();
        b
    }

    #[test]
    fn commit_applies_balances_and_counts_events() {
        let store = InMemoryLedgerStore::new();
        let (item, loc) = (ItemId::new(), LocationId::new());

        let receipt = store
            .commit(ChangeSet {
                balances: vec![Staged {
                    record: received(item, loc),
                    expected: ExpectedVersion::New,
                }],
                event_count: 2,
                ..ChangeSet::default()
            })
            .unwrap();

        assert_eq!(receipt.commit, 1);
        assert_eq!(receipt.first_event_sequence, 1);
        assert_eq!(store.balance(loc, item).unwrap().unwrap().total_quantity, dec!(10));

        let receipt = store.commit(ChangeSet { event_count: 1, ..ChangeSet::default() }).unwrap();
        assert_eq!(receipt.first_event_sequence, 3);
    }

    #[test]
    fn stale_balance_version_is_rejected_atomically() {
        let store = InMemoryLedgerStore::new();
        let (item, loc) = (ItemId::new(), LocationId::new());
        store
            .commit(ChangeSet {
                balances: vec![Staged {
                    record: received(item, loc),
                    expected: ExpectedVersion::New,
                }],
                ..ChangeSet::default()
            })
            .unwrap();

        // A second writer that also read "no balance" loses.
        let mut stale = received(item, loc);
        stale.total_quantity = dec!(99);
        let err = store
            .commit(ChangeSet {
                balances: vec![Staged {
                    record: stale,
                    expected: ExpectedVersion::New,
                }],
                ..ChangeSet::default()
            })
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.balance(loc, item).unwrap().unwrap().total_quantity, dec!(10));
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn lot_sequence_is_monotonic() {
        let store = InMemoryLedgerStore::new();
        let a = store.next_lot_sequence().unwrap();
        let b = store.next_lot_sequence().unwrap();
        assert!(b > a);
    }
}
