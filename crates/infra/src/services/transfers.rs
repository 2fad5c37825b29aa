//! Transfer workflow: the aggregate decides, this module performs the stock
//! movements a transition needs and stages the result.

use rust_decimal::Decimal;
use stockledger_core::{Aggregate, AggregateRoot, LocationId, OperationContext, TransferId};
use stockledger_inventory::{
    CancelTransfer, DocumentRef, MovementKind, MovementRequest, RequestTransfer, ShipTransfer,
    ShippedLine, StockMovement, StockTransfer, TransferAction, TransferCommand, TransferLineRequest,
    TransitionTransfer,
};

use super::movements::{self, MovementOutcome};
use super::Collaborators;
use crate::error::{EngineError, EngineResult};
use crate::events::LedgerEvent;
use crate::store::{LedgerRepository, UnitOfWork};

pub fn create<R: LedgerRepository + ?Sized>(
    uow: &mut UnitOfWork<'_, R>,
    ctx: &OperationContext,
    from: LocationId,
    to: LocationId,
    lines: Vec<TransferLineRequest>,
) -> EngineResult<StockTransfer> {
    for location in [from, to] {
        if uow.repo().location(location)?.is_none() {
            return Err(EngineError::not_found("location", location));
        }
    }
    for line in &lines {
        let item = uow
            .repo()
            .item(line.item_id)?
            .ok_or_else(|| EngineError::not_found("item", line.item_id))?;
        if !item.track_inventory {
            return Err(EngineError::validation(format!(
                "item {} is not stock-tracked and cannot be transferred",
                item.sku
            )));
        }
    }

    let transfer_id = TransferId::new();
    let cmd = TransferCommand::Request(RequestTransfer {
        transfer_id,
        from_location: from,
        to_location: to,
        lines,
        actor: ctx.actor(),
        occurred_at: ctx.occurred_at(),
    });
    let transfer = execute(uow, StockTransfer::empty(transfer_id), None, &cmd)?;

    tracing::info!(
        transfer_id = %transfer_id,
        from_location = %from,
        to_location = %to,
        lines = transfer.lines().len(),
        "stock transfer requested"
    );
    Ok(transfer)
}

pub fn approve<R: LedgerRepository + ?Sized>(
    uow: &mut UnitOfWork<'_, R>,
    ctx: &OperationContext,
    transfer_id: TransferId,
) -> EngineResult<StockTransfer> {
    let transfer = load(uow, transfer_id)?;
    let version = transfer.version();
    let cmd = TransferCommand::Approve(transition(transfer_id, ctx));
    let transfer = execute(uow, transfer, Some(version), &cmd)?;
    log_transition(&transfer, TransferAction::Approve);
    Ok(transfer)
}

/// Issue every line at the source and capture the realized cost.
pub fn ship<R: LedgerRepository + ?Sized>(
    deps: Collaborators<'_>,
    uow: &mut UnitOfWork<'_, R>,
    ctx: &OperationContext,
    transfer_id: TransferId,
) -> EngineResult<StockTransfer> {
    let transfer = load(uow, transfer_id)?;
    transfer.ensure_can(TransferAction::Ship)?;
    let version = transfer.version();
    let from = endpoint(&transfer, transfer.from_location())?;

    let mut shipped = Vec::with_capacity(transfer.lines().len());
    for line in transfer.lines() {
        let request = MovementRequest {
            item_id: line.item_id,
            location_id: from,
            kind: MovementKind::TransferOut {
                transfer_id,
                quantity: line.quantity,
            },
            document: transfer_document(transfer_id),
        };
        let movement = applied(movements::apply(deps, uow, ctx, &request)?)?;
        if movement.unit_cost <= Decimal::ZERO {
            return Err(EngineError::validation(format!(
                "transfer line {} has no cost basis at the source location",
                line.line_no
            )));
        }
        shipped.push(ShippedLine {
            line_no: line.line_no,
            unit_cost: movement.unit_cost,
            total_cost: movement.total_cost,
        });
    }

    let cmd = TransferCommand::Ship(ShipTransfer {
        transfer_id,
        actor: ctx.actor(),
        occurred_at: ctx.occurred_at(),
        lines: shipped,
    });
    let transfer = execute(uow, transfer, Some(version), &cmd)?;
    log_transition(&transfer, TransferAction::Ship);
    Ok(transfer)
}

/// Receive every line at the destination at the cost captured on shipment.
pub fn receive<R: LedgerRepository + ?Sized>(
    deps: Collaborators<'_>,
    uow: &mut UnitOfWork<'_, R>,
    ctx: &OperationContext,
    transfer_id: TransferId,
) -> EngineResult<StockTransfer> {
    let transfer = load(uow, transfer_id)?;
    transfer.ensure_can(TransferAction::Receive)?;
    let version = transfer.version();
    let to = endpoint(&transfer, transfer.to_location())?;

    for line in transfer.lines() {
        let (Some(unit_cost), Some(total_cost)) = (line.unit_cost, line.shipped_cost) else {
            return Err(EngineError::InvariantViolation(format!(
                "transfer {transfer_id} line {} was shipped without a cost",
                line.line_no
            )));
        };
        let request = MovementRequest {
            item_id: line.item_id,
            location_id: to,
            kind: MovementKind::TransferIn {
                transfer_id,
                quantity: line.quantity,
                unit_cost,
                total_cost,
            },
            document: transfer_document(transfer_id),
        };
        applied(movements::apply(deps, uow, ctx, &request)?)?;
    }

    let cmd = TransferCommand::Receive(transition(transfer_id, ctx));
    let transfer = execute(uow, transfer, Some(version), &cmd)?;
    log_transition(&transfer, TransferAction::Receive);
    Ok(transfer)
}

pub fn cancel<R: LedgerRepository + ?Sized>(
    uow: &mut UnitOfWork<'_, R>,
    ctx: &OperationContext,
    transfer_id: TransferId,
    reason: Option<String>,
) -> EngineResult<StockTransfer> {
    let transfer = load(uow, transfer_id)?;
    let version = transfer.version();
    let cmd = TransferCommand::Cancel(CancelTransfer {
        transfer_id,
        actor: ctx.actor(),
        occurred_at: ctx.occurred_at(),
        reason,
    });
    let transfer = execute(uow, transfer, Some(version), &cmd)?;
    log_transition(&transfer, TransferAction::Cancel);
    Ok(transfer)
}

fn load<R: LedgerRepository + ?Sized>(
    uow: &UnitOfWork<'_, R>,
    transfer_id: TransferId,
) -> EngineResult<StockTransfer> {
    uow.transfer(transfer_id)?
        .ok_or_else(|| EngineError::not_found("transfer", transfer_id))
}

/// Decide, apply and stage; events are queued for publication.
fn execute<R: LedgerRepository + ?Sized>(
    uow: &mut UnitOfWork<'_, R>,
    mut transfer: StockTransfer,
    read_version: Option<u64>,
    cmd: &TransferCommand,
) -> EngineResult<StockTransfer> {
    let events = transfer.handle(cmd)?;
    for event in events {
        transfer.apply(&event);
        uow.emit(LedgerEvent::Transfer(event));
    }
    uow.stage_transfer(transfer.clone(), read_version);
    Ok(transfer)
}

fn transition(transfer_id: TransferId, ctx: &OperationContext) -> TransitionTransfer {
    TransitionTransfer {
        transfer_id,
        actor: ctx.actor(),
        occurred_at: ctx.occurred_at(),
    }
}

fn endpoint(transfer: &StockTransfer, location: Option<LocationId>) -> EngineResult<LocationId> {
    location.ok_or_else(|| {
        EngineError::InvariantViolation(format!("transfer {} has no location", transfer.id_typed()))
    })
}

fn applied(outcome: MovementOutcome) -> EngineResult<StockMovement> {
    match outcome {
        MovementOutcome::Applied { movement, .. } => Ok(movement),
        MovementOutcome::NotTracked { item_id } => Err(EngineError::validation(format!(
            "item {item_id} is not stock-tracked and cannot be transferred"
        ))),
    }
}

fn transfer_document(transfer_id: TransferId) -> DocumentRef {
    DocumentRef::new("stock_transfer", transfer_id.to_string())
}

fn log_transition(transfer: &StockTransfer, action: TransferAction) {
    tracing::info!(
        transfer_id = %transfer.id_typed(),
        action = action.as_str(),
        status = %transfer.status(),
        "stock transfer transitioned"
    );
}
