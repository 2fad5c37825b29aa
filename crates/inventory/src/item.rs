use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ItemId, LocationId};

/// Whether a location may carry negative available stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativeStockPolicy {
    #[default]
    Forbid,
    Allow,
}

impl NegativeStockPolicy {
    pub fn allows_negative(self) -> bool {
        matches!(self, NegativeStockPolicy::Allow)
    }
}

/// A stock-holding place. Created by configuration; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub code: String,
    pub name: String,
    pub negative_stock: NegativeStockPolicy,
    /// Informational storage capacity in item units.
    pub capacity: Option<Decimal>,
}

impl Location {
    pub fn new(id: LocationId, code: impl Into<String>, name: impl Into<String>) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("location code cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            name: name.into(),
            negative_stock: NegativeStockPolicy::Forbid,
            capacity: None,
        })
    }

    pub fn with_negative_stock(mut self, policy: NegativeStockPolicy) -> Self {
        self.negative_stock = policy;
        self
    }
}

/// A catalogue item as seen by the valuation engine.
///
/// `standard_cost` is quoted in the base currency and only changes through an
/// administrative update, never as a side effect of a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub sku: String,
    pub name: String,
    /// Service items are not stocked and not costed.
    pub track_inventory: bool,
    pub standard_cost: Decimal,
    pub reorder_point: Decimal,
}

impl Item {
    pub fn new(
        id: ItemId,
        sku: impl Into<String>,
        name: impl Into<String>,
        standard_cost: Decimal,
    ) -> DomainResult<Self> {
        let sku = sku.into();
        if sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if standard_cost.is_sign_negative() {
            return Err(DomainError::validation("standard cost cannot be negative"));
        }
        Ok(Self {
            id,
            sku,
            name: name.into(),
            track_inventory: true,
            standard_cost,
            reorder_point: Decimal::ZERO,
        })
    }

    /// A non-stocked (service) item.
    pub fn service(id: ItemId, sku: impl Into<String>, name: impl Into<String>) -> DomainResult<Self> {
        let mut item = Self::new(id, sku, name, Decimal::ZERO)?;
        item.track_inventory = false;
        Ok(item)
    }

    pub fn with_reorder_point(mut self, reorder_point: Decimal) -> DomainResult<Self> {
        if reorder_point.is_sign_negative() {
            return Err(DomainError::validation("reorder point cannot be negative"));
        }
        self.reorder_point = reorder_point;
        Ok(self)
    }

    /// `true` once on-hand quantity has fallen to or below the reorder point.
    pub fn needs_reorder(&self, on_hand: Decimal) -> bool {
        self.track_inventory && on_hand <= self.reorder_point
    }
}
