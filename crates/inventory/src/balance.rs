//! Per-(location, item) running totals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::money::{checked_product, checked_total, round_money, round_unit_cost, within_tolerance};
use stockledger_core::{DomainError, DomainResult, ItemId, LocationId};

use crate::item::NegativeStockPolicy;

/// Running stock position for one item at one location.
///
/// `total_value` is kept equal to `total_quantity × average_cost` (rounded to
/// money scale) after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryBalance {
    pub location_id: LocationId,
    pub item_id: ItemId,
    pub total_quantity: Decimal,
    pub reserved_quantity: Decimal,
    pub average_cost: Decimal,
    pub total_value: Decimal,
    /// Incremented on every mutation; `0` means never written.
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl InventoryBalance {
    pub fn empty(location_id: LocationId, item_id: ItemId) -> Self {
        Self {
            location_id,
            item_id,
            total_quantity: Decimal::ZERO,
            reserved_quantity: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            total_value: Decimal::ZERO,
            version: 0,
            updated_at: None,
        }
    }

    pub fn available_quantity(&self) -> Decimal {
        self.total_quantity - self.reserved_quantity
    }

    /// Quantity issued beyond what was on hand (negative-stock locations only).
    pub fn backlog_quantity(&self) -> Decimal {
        (-self.total_quantity).max(Decimal::ZERO)
    }

    pub fn is_consistent(&self) -> bool {
        checked_product(self.total_quantity, self.average_cost)
            .is_ok_and(|value| within_tolerance(self.total_value, value))
    }

    /// Apply a signed quantity change.
    ///
    /// Positive deltas are receipts and re-average the cost; negative deltas
    /// are issues and leave the average untouched (the consumed cost was
    /// already determined by lot allocation). `unit_cost` is ignored for
    /// issues.
    pub fn apply_movement(
        &mut self,
        delta: Decimal,
        unit_cost: Decimal,
        policy: NegativeStockPolicy,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if delta > Decimal::ZERO {
            self.receive(delta, unit_cost, at)
        } else if delta < Decimal::ZERO {
            self.issue(-delta, policy, at)
        } else {
            Err(DomainError::validation("quantity delta cannot be zero"))
        }
    }

    /// Check that issuing `quantity` is allowed, without mutating anything.
    pub fn ensure_can_issue(&self, quantity: Decimal, policy: NegativeStockPolicy) -> DomainResult<()> {
        if !policy.allows_negative() && quantity > self.available_quantity() {
            return Err(DomainError::InsufficientAvailableStock {
                location: self.location_id,
                item: self.item_id,
                requested: quantity,
                available: self.available_quantity(),
            });
        }
        Ok(())
    }

    fn receive(&mut self, quantity: Decimal, unit_cost: Decimal, at: DateTime<Utc>) -> DomainResult<()> {
        if unit_cost.is_sign_negative() {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }

        let new_quantity = checked_total([self.total_quantity, quantity])?;
        let average_cost = if self.total_quantity <= Decimal::ZERO || new_quantity <= Decimal::ZERO {
            // Nothing (or a backlog) on hand: the receipt sets the cost basis.
            round_unit_cost(unit_cost)
        } else {
            let value = checked_total([
                checked_product(self.total_quantity, self.average_cost)?,
                checked_product(quantity, unit_cost)?,
            ])?;
            round_unit_cost(value / new_quantity)
        };
        self.set_position(new_quantity, self.reserved_quantity, average_cost, at)
    }

    fn issue(&mut self, quantity: Decimal, policy: NegativeStockPolicy, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_can_issue(quantity, policy)?;
        let new_quantity = checked_total([self.total_quantity, -quantity])?;
        self.set_position(new_quantity, self.reserved_quantity, self.average_cost, at)
    }

    /// Earmark stock for a pending demand.
    pub fn reserve(&mut self, quantity: Decimal, policy: NegativeStockPolicy, at: DateTime<Utc>) -> DomainResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation("reserved quantity must be positive"));
        }
        self.ensure_can_issue(quantity, policy)?;
        let reserved = checked_total([self.reserved_quantity, quantity])?;
        self.set_position(self.total_quantity, reserved, self.average_cost, at)
    }

    /// Release a reservation, clamped at zero. Returns the quantity actually
    /// released; releasing more than is reserved is not an error.
    pub fn release(&mut self, quantity: Decimal, at: DateTime<Utc>) -> DomainResult<Decimal> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation("released quantity must be positive"));
        }
        let released = quantity.min(self.reserved_quantity);
        if released.is_zero() {
            return Ok(released);
        }
        self.set_position(
            self.total_quantity,
            self.reserved_quantity - released,
            self.average_cost,
            at,
        )?;
        Ok(released)
    }

    /// Validate the new position in full, then write it.
    fn set_position(
        &mut self,
        total_quantity: Decimal,
        reserved_quantity: Decimal,
        average_cost: Decimal,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let total_value = round_money(checked_product(total_quantity, average_cost)?);
        // Keeps `available_quantity` representable.
        checked_total([total_quantity, -reserved_quantity])?;

        self.total_quantity = total_quantity;
        self.reserved_quantity = reserved_quantity;
        self.average_cost = average_cost;
        self.total_value = total_value;
        self.version += 1;
        self.updated_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    const FORBID: NegativeStockPolicy = NegativeStockPolicy::Forbid;
    const ALLOW: NegativeStockPolicy = NegativeStockPolicy::Allow;

    fn balance() -> InventoryBalance {
        InventoryBalance::empty(LocationId::new(), ItemId::new())
    }

    #[test]
    fn first_receipt_sets_average_cost() {
        let mut b = balance();
        b.apply_movement(dec!(100), dec!(10.00), FORBID, Utc::now()).unwrap();

        assert_eq!(b.total_quantity, dec!(100));
        assert_eq!(b.average_cost, dec!(10.00));
        assert_eq!(b.total_value, dec!(1000.00));
        assert_eq!(b.version, 1);
    }

    #[test]
    fn receipts_recompute_weighted_average() {
        let mut b = balance();
        b.apply_movement(dec!(10), dec!(500), FORBID, Utc::now()).unwrap();
        b.apply_movement(dec!(5), dec!(520), FORBID, Utc::now()).unwrap();

        // (10×500 + 5×520) / 15
        assert_eq!(b.average_cost, dec!(506.666667));
        assert_eq!(b.total_value, dec!(7600.00));
        assert!(b.is_consistent());
    }

    #[test]
    fn issues_keep_average_cost() {
        let mut b = balance();
        b.apply_movement(dec!(1000), dec!(25.00), FORBID, Utc::now()).unwrap();
        b.apply_movement(dec!(-50), dec!(0), FORBID, Utc::now()).unwrap();

        assert_eq!(b.total_quantity, dec!(950));
        assert_eq!(b.average_cost, dec!(25.00));
        assert_eq!(b.total_value, dec!(23750.00));
    }

    #[test]
    fn issue_beyond_available_is_rejected_without_mutation() {
        let mut b = balance();
        b.apply_movement(dec!(5), dec!(1), FORBID, Utc::now()).unwrap();
        let before = b.clone();

        let err = b.apply_movement(dec!(-6), dec!(0), FORBID, Utc::now()).unwrap_err();

        assert!(matches!(err, DomainError::InsufficientAvailableStock { .. }));
        assert_eq!(b, before);
    }

    #[test]
    fn negative_stock_locations_may_go_below_zero() {
        let mut b = balance();
        b.apply_movement(dec!(-3), dec!(0), ALLOW, Utc::now()).unwrap();
        assert_eq!(b.total_quantity, dec!(-3));
        assert_eq!(b.backlog_quantity(), dec!(3));

        b.apply_movement(dec!(5), dec!(4), ALLOW, Utc::now()).unwrap();
        assert_eq!(b.total_quantity, dec!(2));
        assert_eq!(b.average_cost, dec!(4));
        assert_eq!(b.total_value, dec!(8.00));
    }

    #[test]
    fn reservation_respects_available_quantity() {
        let mut b = balance();
        b.apply_movement(dec!(10), dec!(1), FORBID, Utc::now()).unwrap();
        b.reserve(dec!(8), FORBID, Utc::now()).unwrap();
        assert_eq!(b.available_quantity(), dec!(2));

        assert!(matches!(
            b.reserve(dec!(3), FORBID, Utc::now()),
            Err(DomainError::InsufficientAvailableStock { .. })
        ));
        // Reserved stock cannot be issued either.
        assert!(b.apply_movement(dec!(-3), dec!(0), FORBID, Utc::now()).is_err());
    }

    #[test]
    fn release_is_clamped_and_idempotent() {
        let mut b = balance();
        b.apply_movement(dec!(10), dec!(1), FORBID, Utc::now()).unwrap();
        b.reserve(dec!(4), FORBID, Utc::now()).unwrap();

        assert_eq!(b.release(dec!(4), Utc::now()).unwrap(), dec!(4));
        assert_eq!(b.release(dec!(4), Utc::now()).unwrap(), dec!(0));
        assert_eq!(b.reserved_quantity, dec!(0));
    }

    #[test]
    fn out_of_range_amounts_are_rejected_without_mutation() {
        let mut b = balance();
        b.apply_movement(dec!(10), dec!(4), ALLOW, Utc::now()).unwrap();
        let before = b.clone();
        let huge = Decimal::MAX / dec!(2);

        let err = b.apply_movement(huge, dec!(1000), ALLOW, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("amount out of range"));
        assert!(b.apply_movement(-huge, dec!(0), ALLOW, Utc::now()).is_err());
        assert_eq!(b, before);
    }

    proptest! {
        /// Value tracks quantity × average cost after any receipt/issue sequence.
        #[test]
        fn value_stays_consistent(
            moves in prop::collection::vec((1u32..500, 1u32..100_000, any::<bool>()), 1..30)
        ) {
            let mut b = balance();
            for (qty, cents, inbound) in moves {
                let qty = Decimal::from(qty);
                let cost = Decimal::new(cents as i64, 2);
                if inbound {
                    b.apply_movement(qty, cost, FORBID, Utc::now()).unwrap();
                } else if b.available_quantity() >= qty {
                    b.apply_movement(-qty, Decimal::ZERO, FORBID, Utc::now()).unwrap();
                }
                prop_assert!(b.total_quantity >= Decimal::ZERO);
                prop_assert!(b.is_consistent());
            }
        }
    }
}
