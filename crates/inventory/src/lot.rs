//! Receipt cost lots and FIFO allocation.
//!
//! Every inbound movement that adds cost basis creates a [`StockLot`].
//! Outbound movements consume lots oldest-first through [`allocate`]. Lots are
//! never deleted: an exhausted lot stays behind with `remaining_quantity == 0`
//! for audit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::money::{checked_product, checked_total, round_money, round_unit_cost};
use stockledger_core::{DomainError, DomainResult, ItemId, LocationId, LotId, MovementId};

/// A discrete batch of received stock carrying its own unit cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLot {
    pub id: LotId,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub received_at: DateTime<Utc>,
    /// Creation order within the store; second FIFO tie-breaker.
    pub sequence: u64,
    pub original_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub unit_cost: Decimal,
    pub source_movement: Option<MovementId>,
}

/// Input for [`StockLot::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLot {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub received_at: DateTime<Utc>,
    pub sequence: u64,
    pub source_movement: Option<MovementId>,
}

impl StockLot {
    /// Create a fresh lot; quantity and unit cost must both be positive and
    /// their product representable.
    pub fn receive(new: NewLot) -> DomainResult<Self> {
        if new.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("lot quantity must be positive"));
        }
        if new.unit_cost <= Decimal::ZERO {
            return Err(DomainError::validation("lot unit cost must be positive"));
        }
        checked_product(new.quantity, round_unit_cost(new.unit_cost))?;
        Ok(Self {
            id: LotId::new(),
            item_id: new.item_id,
            location_id: new.location_id,
            received_at: new.received_at,
            sequence: new.sequence,
            original_quantity: new.quantity,
            remaining_quantity: new.quantity,
            unit_cost: round_unit_cost(new.unit_cost),
            source_movement: new.source_movement,
        })
    }

    pub fn total_cost(&self) -> Decimal {
        round_money(self.original_quantity * self.unit_cost)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_quantity <= Decimal::ZERO
    }

    /// Decrement `remaining_quantity`; never below zero.
    pub fn consume(&mut self, quantity: Decimal) -> DomainResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation("consumed quantity must be positive"));
        }
        if quantity > self.remaining_quantity {
            return Err(DomainError::invariant(format!(
                "lot {} has {} remaining, cannot consume {}",
                self.id, self.remaining_quantity, quantity
            )));
        }
        self.remaining_quantity -= quantity;
        Ok(())
    }

    fn fifo_key(&self) -> (DateTime<Utc>, u64, LotId) {
        (self.received_at, self.sequence, self.id)
    }
}

/// Which end of the lot queue an allocation consumes first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumptionOrder {
    /// Oldest received first.
    #[default]
    Fifo,
    /// Newest received first.
    Lifo,
}

/// Quantity taken from one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSlice {
    pub lot_id: LotId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    /// `quantity × unit_cost`, unrounded.
    pub cost: Decimal,
}

/// Result of allocating an outbound quantity against lots.
///
/// When lots cannot cover the request, the remainder is priced at the
/// fallback (standard) cost and reported in `shortfall_quantity`; callers must
/// surface it rather than absorb it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoAllocation {
    pub requested: Decimal,
    pub slices: Vec<AllocationSlice>,
    pub shortfall_quantity: Decimal,
    pub shortfall_unit_cost: Decimal,
    /// Lot cost plus shortfall cost, unrounded.
    pub consumed_cost: Decimal,
}

impl FifoAllocation {
    pub fn allocated_from_lots(&self) -> Decimal {
        self.slices.iter().map(|s| s.quantity).sum()
    }

    pub fn has_shortfall(&self) -> bool {
        self.shortfall_quantity > Decimal::ZERO
    }

    /// Consumed cost of the whole request, rounded to money scale.
    pub fn total_cost(&self) -> Decimal {
        round_money(self.consumed_cost)
    }

    /// Weighted unit cost of what was consumed.
    pub fn average_unit_cost(&self) -> Decimal {
        if self.requested.is_zero() {
            return Decimal::ZERO;
        }
        round_unit_cost(self.consumed_cost / self.requested)
    }
}

/// Consume `quantity_needed` from `lots`, mutating their remaining quantities.
///
/// Candidates are ordered by `(received_at, sequence, id)` (reversed for
/// [`ConsumptionOrder::Lifo`]); exhausted lots are skipped. Lots for other
/// items or locations must not be passed in. The allocation is priced before
/// any lot is touched, so an out-of-range cost leaves `lots` unchanged.
pub fn allocate(
    lots: &mut [StockLot],
    quantity_needed: Decimal,
    fallback_unit_cost: Decimal,
    order: ConsumptionOrder,
) -> DomainResult<FifoAllocation> {
    if quantity_needed <= Decimal::ZERO {
        return Err(DomainError::validation("allocation quantity must be positive"));
    }

    let mut candidates: Vec<usize> = (0..lots.len())
        .filter(|&i| !lots[i].is_exhausted())
        .collect();
    candidates.sort_by_key(|&i| lots[i].fifo_key());
    if order == ConsumptionOrder::Lifo {
        candidates.reverse();
    }

    let mut outstanding = quantity_needed;
    let mut plan = Vec::new();
    for idx in candidates {
        if outstanding.is_zero() {
            break;
        }
        let lot = &lots[idx];
        let take = outstanding.min(lot.remaining_quantity);
        outstanding -= take;
        plan.push((
            idx,
            AllocationSlice {
                lot_id: lot.id,
                quantity: take,
                unit_cost: lot.unit_cost,
                cost: checked_product(take, lot.unit_cost)?,
            },
        ));
    }

    let shortfall_cost = checked_product(outstanding, fallback_unit_cost)?;
    let consumed_cost = checked_total(plan.iter().map(|(_, s)| s.cost).chain([shortfall_cost]))?;

    let mut slices = Vec::with_capacity(plan.len());
    for (idx, slice) in plan {
        lots[idx].consume(slice.quantity)?;
        slices.push(slice);
    }

    Ok(FifoAllocation {
        requested: quantity_needed,
        slices,
        shortfall_quantity: outstanding,
        shortfall_unit_cost: fallback_unit_cost,
        consumed_cost,
    })
}
