//! `InventoryEngine`: the public surface of the ledger.
//!
//! Every write follows the same pipeline:
//!
//! ```text
//! lock keys → UnitOfWork (stage) → ChangeSet → repository commit → publish events
//! ```
//!
//! A failure before `commit` drops the unit of work and nothing is written.
//! Events are published only after a successful commit; a publish failure is
//! reported as [`EngineError::Publish`] with the data already committed.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockledger_accounting::{AccountCode, ExchangeRateSource, JournalEntry, JournalLineRequest, PostJournalEntry};
use stockledger_core::money::checked_total;
use stockledger_core::{ItemId, LocationId, OperationContext, TransferId};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::{
    InventoryBalance, MovementRequest, StockLot, StockMovement, StockTransfer, TransferLineRequest,
};

use crate::accounts::{AccountResolver, ChartAccountResolver};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::LedgerEvent;
use crate::locks::{KeyLocks, StockKey};
use crate::services::movements::MovementOutcome;
use crate::services::{Collaborators, balances, journal, movements, transfers};
use crate::store::{LedgerRepository, UnitOfWork};

/// An item at or below its reorder point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderAlert {
    pub item_id: ItemId,
    pub sku: String,
    pub on_hand: Decimal,
    pub reorder_point: Decimal,
}

pub struct InventoryEngine<R, B> {
    repo: R,
    bus: B,
    config: EngineConfig,
    accounts: Arc<dyn AccountResolver>,
    rates: Arc<dyn ExchangeRateSource + Send + Sync>,
    stock_locks: KeyLocks<StockKey>,
    transfer_locks: KeyLocks<TransferId>,
}

impl<R, B> InventoryEngine<R, B> {
    /// Engine resolving accounts straight from `config.chart`.
    pub fn new(repo: R, bus: B, config: EngineConfig, rates: Arc<dyn ExchangeRateSource + Send + Sync>) -> Self {
        let accounts: Arc<dyn AccountResolver> = Arc::new(ChartAccountResolver::new(config.chart.clone()));
        Self {
            repo,
            bus,
            config,
            accounts,
            rates,
            stock_locks: KeyLocks::new(),
            transfer_locks: KeyLocks::new(),
        }
    }

    pub fn with_account_resolver(mut self, accounts: Arc<dyn AccountResolver>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            config: &self.config,
            accounts: self.accounts.as_ref(),
            rates: self.rates.as_ref(),
        }
    }
}

impl<R, B> InventoryEngine<R, B>
where
    R: LedgerRepository,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn create_stock_movement(
        &self,
        ctx: &OperationContext,
        request: MovementRequest,
    ) -> EngineResult<MovementOutcome> {
        let _guard = self.stock_locks.lock((request.location_id, request.item_id))?;
        self.run("create_stock_movement", |uow| {
            movements::apply(self.collaborators(), uow, ctx, &request)
        })
    }

    pub fn reserve_stock(
        &self,
        location_id: LocationId,
        item_id: ItemId,
        quantity: Decimal,
    ) -> EngineResult<InventoryBalance> {
        let _guard = self.stock_locks.lock((location_id, item_id))?;
        self.run("reserve_stock", |uow| balances::reserve(uow, location_id, item_id, quantity))
    }

    /// Idempotent under retries: over-release clamps at zero.
    pub fn release_stock(
        &self,
        location_id: LocationId,
        item_id: ItemId,
        quantity: Decimal,
    ) -> EngineResult<InventoryBalance> {
        let _guard = self.stock_locks.lock((location_id, item_id))?;
        self.run("release_stock", |uow| balances::release(uow, location_id, item_id, quantity))
    }

    pub fn get_inventory_balance(&self, location_id: LocationId, item_id: ItemId) -> EngineResult<InventoryBalance> {
        balances::get(&self.repo, location_id, item_id)
    }

    pub fn create_stock_transfer(
        &self,
        ctx: &OperationContext,
        from: LocationId,
        to: LocationId,
        lines: Vec<TransferLineRequest>,
    ) -> EngineResult<StockTransfer> {
        self.run("create_stock_transfer", |uow| transfers::create(uow, ctx, from, to, lines))
    }

    pub fn approve_transfer(&self, ctx: &OperationContext, transfer_id: TransferId) -> EngineResult<StockTransfer> {
        let _guard = self.transfer_locks.lock(transfer_id)?;
        self.run("approve_transfer", |uow| transfers::approve(uow, ctx, transfer_id))
    }

    pub fn ship_transfer(&self, ctx: &OperationContext, transfer_id: TransferId) -> EngineResult<StockTransfer> {
        let _transfer_guard = self.transfer_locks.lock(transfer_id)?;
        let keys = self.transfer_keys(transfer_id, |t| t.from_location())?;
        let _stock_guard = self.stock_locks.lock_all(keys)?;
        self.run("ship_transfer", |uow| {
            transfers::ship(self.collaborators(), uow, ctx, transfer_id)
        })
    }

    pub fn receive_transfer(&self, ctx: &OperationContext, transfer_id: TransferId) -> EngineResult<StockTransfer> {
        let _transfer_guard = self.transfer_locks.lock(transfer_id)?;
        let keys = self.transfer_keys(transfer_id, |t| t.to_location())?;
        let _stock_guard = self.stock_locks.lock_all(keys)?;
        self.run("receive_transfer", |uow| {
            transfers::receive(self.collaborators(), uow, ctx, transfer_id)
        })
    }

    pub fn cancel_transfer(
        &self,
        ctx: &OperationContext,
        transfer_id: TransferId,
        reason: Option<String>,
    ) -> EngineResult<StockTransfer> {
        let _guard = self.transfer_locks.lock(transfer_id)?;
        self.run("cancel_transfer", |uow| transfers::cancel(uow, ctx, transfer_id, reason))
    }

    pub fn post_journal_entry(
        &self,
        ctx: &OperationContext,
        description: impl Into<String>,
        reference: impl Into<String>,
        lines: Vec<JournalLineRequest>,
    ) -> EngineResult<JournalEntry> {
        let cmd = PostJournalEntry {
            description: description.into(),
            reference: reference.into(),
            lines,
        };
        self.run("post_journal_entry", |uow| {
            journal::post(self.collaborators(), uow, ctx, &cmd)
        })
    }

    /// Every lot for the position in FIFO order, exhausted lots included.
    pub fn list_lots(&self, location_id: LocationId, item_id: ItemId) -> EngineResult<Vec<StockLot>> {
        let mut lots = self.repo.lots(location_id, item_id)?;
        lots.sort_by_key(|l| (l.received_at, l.sequence, l.id));
        Ok(lots)
    }

    pub fn movements_for(&self, location_id: LocationId, item_id: ItemId) -> EngineResult<Vec<StockMovement>> {
        Ok(self.repo.movements(location_id, item_id)?)
    }

    pub fn journal_entries_by_reference(&self, reference: &str) -> EngineResult<Vec<JournalEntry>> {
        Ok(self.repo.journal_entries_by_reference(reference)?)
    }

    /// Σdebit − Σcredit over every posted entry.
    pub fn account_balance(&self, account: &AccountCode) -> EngineResult<Decimal> {
        if !self.config.chart.contains(account) {
            return Err(EngineError::UnknownAccount(account.to_string()));
        }
        let entries = self.repo.journal_entries()?;
        Ok(checked_total(entries.iter().map(|e| e.net_for(account)))?)
    }

    /// Stock-tracked items whose on-hand quantity at the location is at or
    /// below a positive reorder point, ordered by SKU.
    pub fn items_below_reorder_point(&self, location_id: LocationId) -> EngineResult<Vec<ReorderAlert>> {
        if self.repo.location(location_id)?.is_none() {
            return Err(EngineError::not_found("location", location_id));
        }

        let on_hand_by_item: HashMap<ItemId, Decimal> = self
            .repo
            .balances_at(location_id)?
            .into_iter()
            .map(|b| (b.item_id, b.total_quantity))
            .collect();

        let mut alerts = Vec::new();
        for item in self.repo.items()? {
            if !item.track_inventory || item.reorder_point <= Decimal::ZERO {
                continue;
            }
            let on_hand = on_hand_by_item.get(&item.id).copied().unwrap_or(Decimal::ZERO);
            if item.needs_reorder(on_hand) {
                alerts.push(ReorderAlert {
                    item_id: item.id,
                    sku: item.sku,
                    on_hand,
                    reorder_point: item.reorder_point,
                });
            }
        }
        alerts.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(alerts)
    }

    pub fn get_transfer(&self, transfer_id: TransferId) -> EngineResult<StockTransfer> {
        self.repo
            .transfer(transfer_id)?
            .ok_or_else(|| EngineError::not_found("transfer", transfer_id))
    }

    /// Stock keys a shipment or receipt touches at one end of the transfer.
    fn transfer_keys(
        &self,
        transfer_id: TransferId,
        end: impl Fn(&StockTransfer) -> Option<LocationId>,
    ) -> EngineResult<Vec<StockKey>> {
        let transfer = self.get_transfer(transfer_id)?;
        Ok(match end(&transfer) {
            Some(location) => transfer.lines().iter().map(|l| (location, l.item_id)).collect(),
            None => Vec::new(),
        })
    }

    /// Stage with `op`, commit once, then publish.
    fn run<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&mut UnitOfWork<'_, R>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut uow = UnitOfWork::new(&self.repo);
        let value = match op(&mut uow) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(operation, error = %err, "operation rolled back");
                return Err(err);
            }
        };

        let (changes, events) = uow.finish();
        if changes.is_empty() && events.is_empty() {
            return Ok(value);
        }

        let receipt = self.repo.commit(changes)?;
        tracing::debug!(operation, commit = receipt.commit, events = events.len(), "unit of work committed");

        self.publish(receipt.first_event_sequence, &events)?;
        Ok(value)
    }

    fn publish(&self, first_sequence: u64, events: &[LedgerEvent]) -> EngineResult<()> {
        for (offset, event) in (0u64..).zip(events) {
            let envelope = event
                .to_envelope(first_sequence + offset)
                .map_err(|e| EngineError::Publish(format!("serialize event: {e}")))?;
            self.bus
                .publish(envelope)
                .map_err(|e| EngineError::Publish(format!("{e:?}")))?;
        }
        Ok(())
    }
}
