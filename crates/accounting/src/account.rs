use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{AccountingError, AccountingResult};

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountKind {
    pub fn normal_side(self) -> Side {
        match self {
            AccountKind::Asset | AccountKind::Expense => Side::Debit,
            AccountKind::Liability | AccountKind::Equity | AccountKind::Revenue => Side::Credit,
        }
    }
}

/// Debit or credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

/// General-ledger account code, e.g. `"1300"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountCode(String);

impl AccountCode {
    pub fn new(code: impl Into<String>) -> AccountingResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(AccountingError::validation("account code cannot be empty"));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for AccountCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account identifier + metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub code: AccountCode,
    pub name: String,
    pub kind: AccountKind,
}

/// The posting roles inventory movements need an account for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Inventory,
    /// Offset for receipts (goods received / accounts payable clearing).
    GoodsReceived,
    /// Offset for opening balances.
    OpeningEquity,
    CostOfGoodsSold,
    InventoryAdjustment,
    InventoryWriteOff,
    InTransit,
}

impl AccountRole {
    pub const ALL: [AccountRole; 7] = [
        AccountRole::Inventory,
        AccountRole::GoodsReceived,
        AccountRole::OpeningEquity,
        AccountRole::CostOfGoodsSold,
        AccountRole::InventoryAdjustment,
        AccountRole::InventoryWriteOff,
        AccountRole::InTransit,
    ];
}

/// Known accounts plus the role → account mapping used for inventory postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    accounts: BTreeMap<AccountCode, Account>,
    roles: HashMap<AccountRole, AccountCode>,
}

impl ChartOfAccounts {
    pub fn empty() -> Self {
        Self {
            accounts: BTreeMap::new(),
            roles: HashMap::new(),
        }
    }

    /// Standard chart used when nothing else is configured.
    pub fn standard() -> Self {
        let mut chart = Self::empty();
        let entries = [
            ("1000", "Cash", AccountKind::Asset, None),
            ("1300", "Inventory", AccountKind::Asset, Some(AccountRole::Inventory)),
            ("1350", "Inventory in transit", AccountKind::Asset, Some(AccountRole::InTransit)),
            ("2100", "Accounts payable", AccountKind::Liability, Some(AccountRole::GoodsReceived)),
            ("3900", "Opening balance equity", AccountKind::Equity, Some(AccountRole::OpeningEquity)),
            ("4000", "Sales revenue", AccountKind::Revenue, None),
            ("5000", "Cost of goods sold", AccountKind::Expense, Some(AccountRole::CostOfGoodsSold)),
            ("5100", "Inventory adjustments", AccountKind::Expense, Some(AccountRole::InventoryAdjustment)),
            ("5200", "Inventory write-offs", AccountKind::Expense, Some(AccountRole::InventoryWriteOff)),
        ];
        for (code, name, kind, role) in entries {
            let code = AccountCode(code.to_string());
            chart.accounts.insert(
                code.clone(),
                Account {
                    code: code.clone(),
                    name: name.to_string(),
                    kind,
                },
            );
            if let Some(role) = role {
                chart.roles.insert(role, code);
            }
        }
        chart
    }

    pub fn add_account(&mut self, account: Account) {
        self.accounts.insert(account.code.clone(), account);
    }

    /// Point `role` at an existing account.
    pub fn assign(&mut self, role: AccountRole, code: AccountCode) -> AccountingResult<()> {
        if !self.accounts.contains_key(&code) {
            return Err(AccountingError::UnknownAccount(code.to_string()));
        }
        self.roles.insert(role, code);
        Ok(())
    }

    pub fn account(&self, code: &AccountCode) -> Option<&Account> {
        self.accounts.get(code)
    }

    pub fn contains(&self, code: &AccountCode) -> bool {
        self.accounts.contains_key(code)
    }

    pub fn for_role(&self, role: AccountRole) -> AccountingResult<&AccountCode> {
        self.roles
            .get(&role)
            .ok_or_else(|| AccountingError::UnknownAccount(format!("no account assigned to {role:?}")))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }
}

impl Default for ChartOfAccounts {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_chart_covers_every_role() {
        let chart = ChartOfAccounts::standard();
        for role in AccountRole::ALL {
            let code = chart.for_role(role).unwrap();
            assert!(chart.contains(code));
        }
        assert_eq!(chart.for_role(AccountRole::Inventory).unwrap().as_str(), "1300");
        assert_eq!(chart.for_role(AccountRole::GoodsReceived).unwrap().as_str(), "2100");
    }

    #[test]
    fn assign_rejects_unknown_account() {
        let mut chart = ChartOfAccounts::standard();
        let err = chart
            .assign(AccountRole::InTransit, AccountCode::new("9999").unwrap())
            .unwrap_err();
        assert!(matches!(err, AccountingError::UnknownAccount(_)));
    }

    #[test]
    fn normal_side_follows_kind() {
        assert_eq!(AccountKind::Asset.normal_side(), Side::Debit);
        assert_eq!(AccountKind::Liability.normal_side(), Side::Credit);
        assert_eq!(Side::Debit.opposite(), Side::Credit);
    }
}
