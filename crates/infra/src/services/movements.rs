//! Stock movement processing: costing, balance update, lot bookkeeping and
//! the matching journal entry, all staged in one unit of work.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockledger_accounting::{
    AccountRole, ExchangeRateResolver, JournalEntry, JournalLineRequest, PostJournalEntry,
};
use stockledger_core::money::{checked_product, round_money, round_unit_cost};
use stockledger_core::{ItemId, Money, MovementId, OperationContext};
use stockledger_inventory::{
    ConsumptionOrder, Item, Location, LotConsumption, MovementEvent, MovementKind, MovementRequest,
    MovementType, NewLot, StockLot, StockMovement, allocate,
};

use super::{Collaborators, journal};
use crate::error::{EngineError, EngineResult};
use crate::events::LedgerEvent;
use crate::store::{LedgerRepository, UnitOfWork};

/// Result of [`apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MovementOutcome {
    Applied {
        movement: StockMovement,
        journal_entry: Option<JournalEntry>,
    },
    /// The item is not stock-tracked; nothing was written.
    NotTracked { item_id: ItemId },
}

impl MovementOutcome {
    pub fn movement(&self) -> Option<&StockMovement> {
        match self {
            MovementOutcome::Applied { movement, .. } => Some(movement),
            MovementOutcome::NotTracked { .. } => None,
        }
    }

    pub fn journal_entry(&self) -> Option<&JournalEntry> {
        match self {
            MovementOutcome::Applied { journal_entry, .. } => journal_entry.as_ref(),
            MovementOutcome::NotTracked { .. } => None,
        }
    }
}

/// Costing result of one movement, before it is recorded.
struct Costed {
    signed_quantity: Decimal,
    unit_cost: Decimal,
    total_cost: Decimal,
    lots: Vec<LotConsumption>,
    fallback_quantity: Decimal,
    fallback_unit_cost: Decimal,
}

/// Process one movement request inside `uow`.
///
/// The caller holds the `(location, item)` key lock. On error the unit of
/// work must be dropped: lots, balance and journal changes already staged
/// are not undone here.
pub fn apply<R: LedgerRepository + ?Sized>(
    deps: Collaborators<'_>,
    uow: &mut UnitOfWork<'_, R>,
    ctx: &OperationContext,
    request: &MovementRequest,
) -> EngineResult<MovementOutcome> {
    request.kind.validate()?;

    let item = uow
        .repo()
        .item(request.item_id)?
        .ok_or_else(|| EngineError::not_found("item", request.item_id))?;
    let location = uow
        .repo()
        .location(request.location_id)?
        .ok_or_else(|| EngineError::not_found("location", request.location_id))?;

    if !item.track_inventory {
        tracing::debug!(item_id = %item.id, sku = %item.sku, "movement skipped for non-stocked item");
        return Ok(MovementOutcome::NotTracked { item_id: item.id });
    }

    let movement_id = MovementId::new();
    let costed = match &request.kind {
        MovementKind::Opening { quantity, unit_cost } | MovementKind::Receipt { quantity, unit_cost } => {
            let unit = unit_cost_in_base(deps, ctx, unit_cost)?;
            let total = round_money(checked_product(*quantity, unit)?);
            receive(uow, ctx, &item, &location, movement_id, *quantity, unit, total)?
        }
        MovementKind::Adjustment {
            delta, unit_cost, ..
        } if *delta > Decimal::ZERO => {
            let unit = match unit_cost {
                Some(cost) => unit_cost_in_base(deps, ctx, cost)?,
                None if item.standard_cost > Decimal::ZERO => item.standard_cost,
                None => {
                    return Err(EngineError::validation(format!(
                        "item {} has no standard cost; positive adjustment needs a unit cost",
                        item.sku
                    )));
                }
            };
            let total = round_money(checked_product(*delta, unit)?);
            receive(uow, ctx, &item, &location, movement_id, *delta, unit, total)?
        }
        MovementKind::Adjustment { delta, write_off, .. } => {
            let order = if *write_off {
                deps.config.write_off_order
            } else {
                ConsumptionOrder::Fifo
            };
            issue(uow, ctx, &item, &location, -*delta, order)?
        }
        MovementKind::Issue { quantity } | MovementKind::TransferOut { quantity, .. } => {
            issue(uow, ctx, &item, &location, *quantity, ConsumptionOrder::Fifo)?
        }
        MovementKind::TransferIn {
            quantity,
            unit_cost,
            total_cost,
            ..
        } => receive(
            uow,
            ctx,
            &item,
            &location,
            movement_id,
            *quantity,
            *unit_cost,
            round_money(*total_cost),
        )?,
    };

    let movement_type = request.kind.movement_type();
    let journal_entry = if costed.total_cost > Decimal::ZERO {
        let cmd = inventory_posting(deps, &item, &location, request, movement_id, &costed)?;
        Some(journal::post(deps, uow, ctx, &cmd)?)
    } else {
        None
    };

    let movement = StockMovement {
        id: movement_id,
        item_id: item.id,
        location_id: location.id,
        movement_type,
        quantity: costed.signed_quantity,
        unit_cost: costed.unit_cost,
        total_cost: costed.total_cost,
        document: request.document.clone(),
        lots: costed.lots,
        fallback_quantity: costed.fallback_quantity,
        journal_entry_id: journal_entry.as_ref().map(|e| e.id),
        occurred_at: ctx.occurred_at(),
        actor: ctx.actor(),
    };

    if movement.used_fallback_cost() {
        tracing::warn!(
            movement_id = %movement.id,
            item_id = %item.id,
            location_id = %location.id,
            shortfall = %movement.fallback_quantity,
            fallback_unit_cost = %costed.fallback_unit_cost,
            "lots exhausted; shortfall priced at standard cost"
        );
        uow.emit(LedgerEvent::Movement(MovementEvent::shortfall(
            &movement,
            costed.fallback_unit_cost,
        )));
    }

    tracing::info!(
        movement_id = %movement.id,
        movement_type = %movement.movement_type,
        item_id = %item.id,
        location_id = %location.id,
        quantity = %movement.quantity,
        total_cost = %movement.total_cost,
        "stock movement applied"
    );

    uow.emit(LedgerEvent::Movement(MovementEvent::applied(&movement)));
    uow.record_movement(movement.clone());

    Ok(MovementOutcome::Applied {
        movement,
        journal_entry,
    })
}

fn unit_cost_in_base(deps: Collaborators<'_>, ctx: &OperationContext, cost: &Money) -> EngineResult<Decimal> {
    let conversion = ExchangeRateResolver::new(deps.rates).to_base(
        cost,
        deps.config.base_currency,
        ctx.occurred_at(),
    )?;
    Ok(round_unit_cost(conversion.base_amount))
}

#[allow(clippy::too_many_arguments)]
fn receive<R: LedgerRepository + ?Sized>(
    uow: &mut UnitOfWork<'_, R>,
    ctx: &OperationContext,
    item: &Item,
    location: &Location,
    movement_id: MovementId,
    quantity: Decimal,
    unit_cost: Decimal,
    total_cost: Decimal,
) -> EngineResult<Costed> {
    let backlog = {
        let balance = uow.balance_mut(location.id, item.id)?;
        let backlog = balance.backlog_quantity();
        balance.apply_movement(quantity, unit_cost, location.negative_stock, ctx.occurred_at())?;
        backlog
    };

    // Stock issued into a negative balance had no lot; the receipt covers
    // that backlog first and only the remainder becomes a lot.
    let lot_quantity = quantity - backlog.min(quantity);
    let mut lots = Vec::new();
    if lot_quantity > Decimal::ZERO {
        let lot = StockLot::receive(NewLot {
            item_id: item.id,
            location_id: location.id,
            quantity: lot_quantity,
            unit_cost,
            received_at: ctx.occurred_at(),
            sequence: uow.repo().next_lot_sequence()?,
            source_movement: Some(movement_id),
        })?;
        lots.push(LotConsumption {
            lot_id: lot.id,
            quantity: lot.original_quantity,
            unit_cost: lot.unit_cost,
        });
        uow.add_lot(lot)?;
    }

    Ok(Costed {
        signed_quantity: quantity,
        unit_cost: round_unit_cost(unit_cost),
        total_cost,
        lots,
        fallback_quantity: Decimal::ZERO,
        fallback_unit_cost: Decimal::ZERO,
    })
}

fn issue<R: LedgerRepository + ?Sized>(
    uow: &mut UnitOfWork<'_, R>,
    ctx: &OperationContext,
    item: &Item,
    location: &Location,
    quantity: Decimal,
    order: ConsumptionOrder,
) -> EngineResult<Costed> {
    uow.balance_mut(location.id, item.id)?
        .ensure_can_issue(quantity, location.negative_stock)?;

    let allocation = allocate(
        uow.lots_mut(location.id, item.id)?,
        quantity,
        item.standard_cost,
        order,
    )?;

    uow.balance_mut(location.id, item.id)?.apply_movement(
        -quantity,
        Decimal::ZERO,
        location.negative_stock,
        ctx.occurred_at(),
    )?;

    Ok(Costed {
        signed_quantity: -quantity,
        unit_cost: allocation.average_unit_cost(),
        total_cost: allocation.total_cost(),
        lots: allocation
            .slices
            .iter()
            .map(|s| LotConsumption {
                lot_id: s.lot_id,
                quantity: s.quantity,
                unit_cost: s.unit_cost,
            })
            .collect(),
        fallback_quantity: allocation.shortfall_quantity,
        fallback_unit_cost: allocation.shortfall_unit_cost,
    })
}

/// Debit and credit roles for an inventory movement.
fn posting_roles(kind: &MovementKind) -> (AccountRole, AccountRole) {
    match kind {
        MovementKind::Opening { .. } => (AccountRole::Inventory, AccountRole::OpeningEquity),
        MovementKind::Receipt { .. } => (AccountRole::Inventory, AccountRole::GoodsReceived),
        MovementKind::Issue { .. } => (AccountRole::CostOfGoodsSold, AccountRole::Inventory),
        MovementKind::Adjustment { delta, .. } if *delta > Decimal::ZERO => {
            (AccountRole::Inventory, AccountRole::InventoryAdjustment)
        }
        MovementKind::Adjustment { write_off: true, .. } => {
            (AccountRole::InventoryWriteOff, AccountRole::Inventory)
        }
        MovementKind::Adjustment { .. } => (AccountRole::InventoryAdjustment, AccountRole::Inventory),
        MovementKind::TransferOut { .. } => (AccountRole::InTransit, AccountRole::Inventory),
        MovementKind::TransferIn { .. } => (AccountRole::Inventory, AccountRole::InTransit),
    }
}

fn inventory_posting(
    deps: Collaborators<'_>,
    item: &Item,
    location: &Location,
    request: &MovementRequest,
    movement_id: MovementId,
    costed: &Costed,
) -> EngineResult<PostJournalEntry> {
    let (debit_role, credit_role) = posting_roles(&request.kind);
    let debit = deps.accounts.resolve(debit_role, item, location)?;
    let credit = deps.accounts.resolve(credit_role, item, location)?;
    let base = deps.config.base_currency;
    let movement_type = request.kind.movement_type();

    Ok(PostJournalEntry {
        description: movement_description(movement_type, item, location, request.kind.signed_quantity().abs()),
        reference: format!("STOCK-{}-{}", movement_type.as_str(), movement_id),
        lines: vec![
            JournalLineRequest::debit(debit, base, costed.total_cost),
            JournalLineRequest::credit(credit, base, costed.total_cost),
        ],
    })
}

fn movement_description(
    movement_type: MovementType,
    item: &Item,
    location: &Location,
    quantity: Decimal,
) -> String {
    format!(
        "{movement_type} {quantity} x {} ({}) at {}",
        item.sku, item.name, location.code
    )
}
