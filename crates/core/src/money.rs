//! Decimal money primitives.
//!
//! Amounts are `rust_decimal::Decimal`, never binary floating point. Money is
//! persisted at [`MONEY_SCALE`] decimal places; unit costs keep
//! [`UNIT_COST_SCALE`] places until they are multiplied into an amount.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Decimal places for persisted money amounts.
pub const MONEY_SCALE: u32 = 2;

/// Decimal places for unit costs before they are rounded into an amount.
pub const UNIT_COST_SCALE: u32 = 6;

/// Largest difference tolerated between two money totals that must agree
/// (debits vs credits, value vs quantity × average cost).
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Round to money scale (banker's rounding).
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Round to unit-cost scale (banker's rounding).
pub fn round_unit_cost(cost: Decimal) -> Decimal {
    cost.round_dp_with_strategy(UNIT_COST_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// `a × b`, or a validation error when the product leaves `Decimal` range.
pub fn checked_product(a: Decimal, b: Decimal) -> DomainResult<Decimal> {
    a.checked_mul(b).ok_or_else(out_of_range)
}

/// Sum of `values`, or a validation error on overflow.
pub fn checked_total(values: impl IntoIterator<Item = Decimal>) -> DomainResult<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v).ok_or_else(out_of_range))
}

fn out_of_range() -> DomainError {
    DomainError::validation("amount out of range")
}

/// `true` when `a` and `b` differ by no more than [`BALANCE_TOLERANCE`].
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= BALANCE_TOLERANCE
}

/// ISO-4217 style currency code (three ASCII uppercase letters).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub const USD: CurrencyCode = CurrencyCode(*b"USD");
    pub const EUR: CurrencyCode = CurrencyCode(*b"EUR");

    pub fn new(code: &str) -> DomainResult<Self> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(DomainError::invalid_id(format!(
                "currency code must be three uppercase letters, got '{code}'"
            )));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        // Constructor only admits ASCII uppercase.
        core::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl core::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for CurrencyCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.as_str().to_string()
    }
}

impl ValueObject for CurrencyCode {}

/// An amount quoted in a specific currency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: CurrencyCode,
}

impl Money {
    pub fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }
}

impl ValueObject for Money {}
