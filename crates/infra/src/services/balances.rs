use chrono::Utc;
use rust_decimal::Decimal;
use stockledger_core::{ItemId, LocationId};
use stockledger_inventory::{InventoryBalance, Location};

use crate::error::{EngineError, EngineResult};
use crate::store::{LedgerRepository, UnitOfWork};

/// Earmark `quantity` at the location.
pub fn reserve<R: LedgerRepository + ?Sized>(
    uow: &mut UnitOfWork<'_, R>,
    location_id: LocationId,
    item_id: ItemId,
    quantity: Decimal,
) -> EngineResult<InventoryBalance> {
    let location = position(uow, location_id, item_id)?;
    let balance = uow.balance_mut(location_id, item_id)?;
    balance.reserve(quantity, location.negative_stock, Utc::now())?;

    tracing::info!(
        location_id = %location_id,
        item_id = %item_id,
        quantity = %quantity,
        reserved = %balance.reserved_quantity,
        "stock reserved"
    );
    Ok(balance.clone())
}

/// Release up to `quantity` of a reservation. Releasing more than is
/// reserved clamps at zero, so retries are harmless.
pub fn release<R: LedgerRepository + ?Sized>(
    uow: &mut UnitOfWork<'_, R>,
    location_id: LocationId,
    item_id: ItemId,
    quantity: Decimal,
) -> EngineResult<InventoryBalance> {
    position(uow, location_id, item_id)?;
    let balance = uow.balance_mut(location_id, item_id)?;
    let released = balance.release(quantity, Utc::now())?;

    if released < quantity {
        tracing::debug!(
            location_id = %location_id,
            item_id = %item_id,
            requested = %quantity,
            released = %released,
            "release clamped at zero reserved"
        );
    } else {
        tracing::info!(location_id = %location_id, item_id = %item_id, released = %released, "stock released");
    }
    Ok(balance.clone())
}

/// Both ends of a stock position must exist before its balance is touched.
fn position<R: LedgerRepository + ?Sized>(
    uow: &UnitOfWork<'_, R>,
    location_id: LocationId,
    item_id: ItemId,
) -> EngineResult<Location> {
    let location = uow
        .repo()
        .location(location_id)?
        .ok_or_else(|| EngineError::not_found("location", location_id))?;
    if uow.repo().item(item_id)?.is_none() {
        return Err(EngineError::not_found("item", item_id));
    }
    Ok(location)
}

/// Current balance, or a zero balance when the key was never written.
pub fn get<R: LedgerRepository + ?Sized>(
    repo: &R,
    location_id: LocationId,
    item_id: ItemId,
) -> EngineResult<InventoryBalance> {
    Ok(repo
        .balance(location_id, item_id)?
        .unwrap_or_else(|| InventoryBalance::empty(location_id, item_id)))
}
