//! Stock movement requests and the append-only movement record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    DomainError, DomainResult, ItemId, JournalEntryId, LocationId, LotId, Money, MovementId,
    TransferId, UserId,
};
use stockledger_events::Event;

/// Movement type as persisted on the record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    TransferOut,
    TransferIn,
    Adjustment,
    Opening,
}

impl MovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::TransferOut => "TRANSFER_OUT",
            MovementType::TransferIn => "TRANSFER_IN",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::Opening => "OPENING",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The business document a movement originates from (PO receipt, sales
/// shipment, count sheet, transfer...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: String,
    pub id: String,
}

impl DocumentRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Kind-specific payload of a movement request.
///
/// Each variant carries exactly the fields it needs; quantities are always
/// positive except for `Adjustment::delta`, which is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovementKind {
    /// Initial stock when the ledger is first populated.
    Opening { quantity: Decimal, unit_cost: Money },
    /// Goods received (purchase receipt, production output...).
    Receipt { quantity: Decimal, unit_cost: Money },
    /// Goods issued (sale, consumption).
    Issue { quantity: Decimal },
    /// Count correction or write-off. A missing `unit_cost` on a positive
    /// delta falls back to the item's standard cost.
    Adjustment {
        delta: Decimal,
        unit_cost: Option<Money>,
        write_off: bool,
    },
    /// Outbound leg of a transfer at the source location.
    TransferOut { transfer_id: TransferId, quantity: Decimal },
    /// Inbound leg of a transfer, carrying the cost realized at shipment.
    TransferIn {
        transfer_id: TransferId,
        quantity: Decimal,
        unit_cost: Decimal,
        total_cost: Decimal,
    },
}

impl MovementKind {
    pub fn movement_type(&self) -> MovementType {
        match self {
            MovementKind::Opening { .. } => MovementType::Opening,
            MovementKind::Receipt { .. } => MovementType::In,
            MovementKind::Issue { .. } => MovementType::Out,
            MovementKind::Adjustment { .. } => MovementType::Adjustment,
            MovementKind::TransferOut { .. } => MovementType::TransferOut,
            MovementKind::TransferIn { .. } => MovementType::TransferIn,
        }
    }

    /// Signed quantity change this movement applies to the balance.
    pub fn signed_quantity(&self) -> Decimal {
        match self {
            MovementKind::Opening { quantity, .. }
            | MovementKind::Receipt { quantity, .. }
            | MovementKind::TransferIn { quantity, .. } => *quantity,
            MovementKind::Issue { quantity } | MovementKind::TransferOut { quantity, .. } => -*quantity,
            MovementKind::Adjustment { delta, .. } => *delta,
        }
    }

    /// Shape/range validation performed before anything is read or locked.
    pub fn validate(&self) -> DomainResult<()> {
        match self {
            MovementKind::Adjustment { delta, unit_cost, .. } => {
                if delta.is_zero() {
                    return Err(DomainError::validation("adjustment delta cannot be zero"));
                }
                if let Some(cost) = unit_cost {
                    if cost.amount <= Decimal::ZERO {
                        return Err(DomainError::validation("unit cost must be positive"));
                    }
                }
                Ok(())
            }
            MovementKind::Opening { quantity, unit_cost }
            | MovementKind::Receipt { quantity, unit_cost } => {
                ensure_positive_quantity(*quantity)?;
                if unit_cost.amount <= Decimal::ZERO {
                    return Err(DomainError::validation("unit cost must be positive"));
                }
                Ok(())
            }
            MovementKind::Issue { quantity } | MovementKind::TransferOut { quantity, .. } => {
                ensure_positive_quantity(*quantity)
            }
            MovementKind::TransferIn {
                quantity,
                unit_cost,
                total_cost,
                ..
            } => {
                ensure_positive_quantity(*quantity)?;
                if *unit_cost <= Decimal::ZERO || total_cost.is_sign_negative() {
                    return Err(DomainError::validation("transfer cost must be positive"));
                }
                Ok(())
            }
        }
    }
}

fn ensure_positive_quantity(quantity: Decimal) -> DomainResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation("quantity must be positive"));
    }
    Ok(())
}

/// A request to move stock for one item at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub kind: MovementKind,
    pub document: DocumentRef,
}

/// A lot touched by a movement: created (inbound) or consumed (outbound).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotConsumption {
    pub lot_id: LotId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

/// Append-only ledger record of a costed movement.
///
/// Never updated or deleted once committed; corrections are new,
/// compensating movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub movement_type: MovementType,
    /// Positive for inbound, negative for outbound.
    pub quantity: Decimal,
    /// Base-currency unit cost (consumed average for outbound movements).
    pub unit_cost: Decimal,
    /// Base-currency total cost, money scale.
    pub total_cost: Decimal,
    pub document: DocumentRef,
    pub lots: Vec<LotConsumption>,
    /// Outbound quantity that no lot covered and was priced at standard cost.
    pub fallback_quantity: Decimal,
    pub journal_entry_id: Option<JournalEntryId>,
    pub occurred_at: DateTime<Utc>,
    pub actor: UserId,
}

impl StockMovement {
    pub fn used_fallback_cost(&self) -> bool {
        self.fallback_quantity > Decimal::ZERO
    }
}

/// Event: a movement was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementApplied {
    pub movement_id: MovementId,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub total_cost: Decimal,
    pub journal_entry_id: Option<JournalEntryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: an outbound movement ran out of lots and used standard cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationShortfall {
    pub movement_id: MovementId,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub shortfall_quantity: Decimal,
    pub fallback_unit_cost: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementEvent {
    MovementApplied(MovementApplied),
    AllocationShortfall(AllocationShortfall),
}

impl MovementEvent {
    pub fn applied(movement: &StockMovement) -> Self {
        MovementEvent::MovementApplied(MovementApplied {
            movement_id: movement.id,
            item_id: movement.item_id,
            location_id: movement.location_id,
            movement_type: movement.movement_type,
            quantity: movement.quantity,
            total_cost: movement.total_cost,
            journal_entry_id: movement.journal_entry_id,
            occurred_at: movement.occurred_at,
        })
    }

    pub fn shortfall(movement: &StockMovement, fallback_unit_cost: Decimal) -> Self {
        MovementEvent::AllocationShortfall(AllocationShortfall {
            movement_id: movement.id,
            item_id: movement.item_id,
            location_id: movement.location_id,
            shortfall_quantity: movement.fallback_quantity,
            fallback_unit_cost,
            occurred_at: movement.occurred_at,
        })
    }

    pub fn movement_id(&self) -> MovementId {
        match self {
            MovementEvent::MovementApplied(e) => e.movement_id,
            MovementEvent::AllocationShortfall(e) => e.movement_id,
        }
    }
}

impl Event for MovementEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MovementEvent::MovementApplied(_) => "inventory.movement.applied",
            MovementEvent::AllocationShortfall(_) => "inventory.movement.allocation_shortfall",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MovementEvent::MovementApplied(e) => e.occurred_at,
            MovementEvent::AllocationShortfall(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockledger_core::CurrencyCode;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, CurrencyCode::new("USD").unwrap())
    }

    #[test]
    fn signed_quantity_follows_direction() {
        assert_eq!(MovementKind::Receipt { quantity: dec!(5), unit_cost: usd(dec!(1)) }.signed_quantity(), dec!(5));
        assert_eq!(MovementKind::Issue { quantity: dec!(5) }.signed_quantity(), dec!(-5));
        assert_eq!(
            MovementKind::Adjustment { delta: dec!(-2), unit_cost: None, write_off: true }.signed_quantity(),
            dec!(-2)
        );
    }

    #[test]
    fn validation_rejects_non_positive_quantities_and_costs() {
        assert!(MovementKind::Issue { quantity: dec!(0) }.validate().is_err());
        assert!(MovementKind::Receipt { quantity: dec!(1), unit_cost: usd(dec!(0)) }.validate().is_err());
        assert!(MovementKind::Adjustment { delta: dec!(0), unit_cost: None, write_off: false }.validate().is_err());
        assert!(MovementKind::Adjustment { delta: dec!(-1), unit_cost: None, write_off: false }.validate().is_ok());
    }

    #[test]
    fn movement_type_serializes_in_screaming_case() {
        let json = serde_json::to_string(&MovementType::TransferOut).unwrap();
        assert_eq!(json, "\"TRANSFER_OUT\"");
        for ty in [
            MovementType::In,
            MovementType::Out,
            MovementType::TransferOut,
            MovementType::TransferIn,
            MovementType::Adjustment,
            MovementType::Opening,
        ] {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
        }
        assert_eq!(MovementKind::Opening { quantity: dec!(1), unit_cost: usd(dec!(1)) }.movement_type(), MovementType::Opening);
    }
}
