//! Account resolution for inventory postings.

use std::collections::HashMap;

use stockledger_accounting::{AccountCode, AccountRole, AccountingError, ChartOfAccounts};
use stockledger_core::LocationId;
use stockledger_inventory::{Item, Location};

use crate::error::EngineResult;

/// Maps a posting role to a concrete ledger account for one stock position.
pub trait AccountResolver: Send + Sync {
    fn resolve(&self, role: AccountRole, item: &Item, location: &Location) -> EngineResult<AccountCode>;
}

/// Resolver backed by the configured chart of accounts, with optional
/// per-location overrides (e.g. a separate inventory account per warehouse).
#[derive(Debug, Clone)]
pub struct ChartAccountResolver {
    chart: ChartOfAccounts,
    location_overrides: HashMap<(LocationId, AccountRole), AccountCode>,
}

impl ChartAccountResolver {
    pub fn new(chart: ChartOfAccounts) -> Self {
        Self {
            chart,
            location_overrides: HashMap::new(),
        }
    }

    pub fn with_location_override(
        mut self,
        location: LocationId,
        role: AccountRole,
        code: AccountCode,
    ) -> EngineResult<Self> {
        if !self.chart.contains(&code) {
            return Err(AccountingError::UnknownAccount(code.to_string()).into());
        }
        self.location_overrides.insert((location, role), code);
        Ok(self)
    }
}

impl AccountResolver for ChartAccountResolver {
    fn resolve(&self, role: AccountRole, _item: &Item, location: &Location) -> EngineResult<AccountCode> {
        if let Some(code) = self.location_overrides.get(&(location.id, role)) {
            return Ok(code.clone());
        }
        Ok(self.chart.for_role(role)?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockledger_accounting::{Account, AccountKind};
    use stockledger_core::ItemId;

    use crate::error::EngineError;

    #[test]
    fn location_override_wins_over_chart_role() {
        let mut chart = ChartOfAccounts::standard();
        let code = AccountCode::new("1310").unwrap();
        chart.add_account(Account {
            code: code.clone(),
            name: "Inventory - east".into(),
            kind: AccountKind::Asset,
        });
        let east = Location::new(LocationId::new(), "EAST", "East").unwrap();
        let west = Location::new(LocationId::new(), "WEST", "West").unwrap();
        let item = Item::new(ItemId::new(), "W-1", "Widget", dec!(1)).unwrap();

        let resolver = ChartAccountResolver::new(chart)
            .with_location_override(east.id, AccountRole::Inventory, code.clone())
            .unwrap();

        assert_eq!(resolver.resolve(AccountRole::Inventory, &item, &east).unwrap(), code);
        assert_eq!(
            resolver.resolve(AccountRole::Inventory, &item, &west).unwrap().as_str(),
            "1300"
        );
    }

    #[test]
    fn override_must_exist_in_chart() {
        let err = ChartAccountResolver::new(ChartOfAccounts::standard())
            .with_location_override(
                LocationId::new(),
                AccountRole::Inventory,
                AccountCode::new("7777").unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownAccount(_)));
    }
}
