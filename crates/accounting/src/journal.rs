//! Double-entry journal entries.
//!
//! [`JournalEntry::post`] is the single way an entry comes into existence:
//! it converts every line to the base currency, rounds to money scale and
//! refuses anything that does not balance. Entries are immutable afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::money::{checked_total, round_money, within_tolerance};
use stockledger_core::{CurrencyCode, JournalEntryId, OperationContext, UserId};
use stockledger_events::Event;

use crate::account::{AccountCode, ChartOfAccounts, Side};
use crate::error::{AccountingError, AccountingResult};
use crate::exchange::{ExchangeRateResolver, ExchangeRateSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalStatus {
    Posted,
}

/// Line as requested by the caller, in any currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLineRequest {
    pub account: AccountCode,
    pub side: Side,
    pub currency: CurrencyCode,
    /// Positive amount in `currency`.
    pub amount: Decimal,
}

impl JournalLineRequest {
    pub fn debit(account: AccountCode, currency: CurrencyCode, amount: Decimal) -> Self {
        Self {
            account,
            side: Side::Debit,
            currency,
            amount,
        }
    }

    pub fn credit(account: AccountCode, currency: CurrencyCode, amount: Decimal) -> Self {
        Self {
            account,
            side: Side::Credit,
            currency,
            amount,
        }
    }
}

/// Original foreign-currency figure kept alongside a converted line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignAmount {
    pub currency: CurrencyCode,
    pub amount: Decimal,
    pub rate: Decimal,
}

/// Posted line. Exactly one of `debit`/`credit` is non-zero; both are in the
/// base currency at money scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account: AccountCode,
    pub debit: Decimal,
    pub credit: Decimal,
    pub currency: CurrencyCode,
    pub original: Option<ForeignAmount>,
}

impl JournalLine {
    pub fn side(&self) -> Side {
        if self.debit > Decimal::ZERO {
            Side::Debit
        } else {
            Side::Credit
        }
    }

    /// Debit minus credit.
    pub fn net(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// Command: PostJournalEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostJournalEntry {
    pub description: String,
    pub reference: String,
    pub lines: Vec<JournalLineRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub entry_date: DateTime<Utc>,
    pub description: String,
    pub reference: String,
    pub status: JournalStatus,
    pub lines: Vec<JournalLine>,
    pub posted_by: UserId,
}

impl JournalEntry {
    /// Validate, convert and round `cmd` into a posted entry.
    ///
    /// Rates are looked up as of `ctx.occurred_at()`. Fails on an empty entry,
    /// an unknown account, a non-positive amount, a missing rate or totals
    /// that differ by more than one cent.
    pub fn post<S: ExchangeRateSource + ?Sized>(
        id: JournalEntryId,
        cmd: &PostJournalEntry,
        ctx: &OperationContext,
        base: CurrencyCode,
        chart: &ChartOfAccounts,
        rates: &ExchangeRateResolver<'_, S>,
    ) -> AccountingResult<Self> {
        if cmd.lines.is_empty() {
            return Err(AccountingError::validation("journal entry must have lines"));
        }
        if cmd.reference.trim().is_empty() {
            return Err(AccountingError::validation("journal reference cannot be empty"));
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        for req in &cmd.lines {
            if !chart.contains(&req.account) {
                return Err(AccountingError::UnknownAccount(req.account.to_string()));
            }
            if req.amount <= Decimal::ZERO {
                return Err(AccountingError::validation("amount must be positive"));
            }

            let conversion = rates.resolve(req.currency, base, req.amount, ctx.occurred_at())?;
            let amount = round_money(conversion.base_amount);
            if amount.is_zero() {
                return Err(AccountingError::validation(format!(
                    "amount {} {} rounds to zero",
                    req.amount, req.currency
                )));
            }
            let original = (req.currency != base).then(|| ForeignAmount {
                currency: req.currency,
                amount: req.amount,
                rate: conversion.rate,
            });

            let (debit, credit) = match req.side {
                Side::Debit => (amount, Decimal::ZERO),
                Side::Credit => (Decimal::ZERO, amount),
            };
            lines.push(JournalLine {
                account: req.account.clone(),
                debit,
                credit,
                currency: base,
                original,
            });
        }

        let entry = Self {
            id,
            entry_date: ctx.occurred_at(),
            description: cmd.description.clone(),
            reference: cmd.reference.clone(),
            status: JournalStatus::Posted,
            lines,
            posted_by: ctx.actor(),
        };

        let (debit, credit) = (
            checked_sum(entry.lines.iter().map(|l| l.debit))?,
            checked_sum(entry.lines.iter().map(|l| l.credit))?,
        );
        if !within_tolerance(debit, credit) {
            return Err(AccountingError::UnbalancedJournal { debit, credit });
        }
        Ok(entry)
    }

    pub fn total_debit(&self) -> Decimal {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credit(&self) -> Decimal {
        self.lines.iter().map(|l| l.credit).sum()
    }

    pub fn is_balanced(&self) -> bool {
        within_tolerance(self.total_debit(), self.total_credit())
    }

    /// Net movement (debit − credit) this entry puts on `account`.
    pub fn net_for(&self, account: &AccountCode) -> Decimal {
        self.lines
            .iter()
            .filter(|l| &l.account == account)
            .map(JournalLine::net)
            .sum()
    }
}

fn checked_sum(amounts: impl Iterator<Item = Decimal>) -> AccountingResult<Decimal> {
    checked_total(amounts).map_err(|_| AccountingError::validation("journal total out of range"))
}

/// Event: JournalPosted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalPosted {
    pub entry_id: JournalEntryId,
    pub reference: String,
    pub total: Decimal,
    pub posted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEvent {
    JournalPosted(JournalPosted),
}

impl JournalEvent {
    pub fn posted(entry: &JournalEntry) -> Self {
        JournalEvent::JournalPosted(JournalPosted {
            entry_id: entry.id,
            reference: entry.reference.clone(),
            total: entry.total_debit(),
            posted_by: entry.posted_by,
            occurred_at: entry.entry_date,
        })
    }
}

impl Event for JournalEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JournalEvent::JournalPosted(_) => "accounting.journal.posted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            JournalEvent::JournalPosted(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeRate;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD").unwrap()
    }

    fn eur() -> CurrencyCode {
        CurrencyCode::new("EUR").unwrap()
    }

    fn code(c: &str) -> AccountCode {
        AccountCode::new(c).unwrap()
    }

    fn ctx() -> OperationContext {
        OperationContext::new(UserId::new(), Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
    }

    fn rates() -> Vec<ExchangeRate> {
        vec![
            ExchangeRate::new(
                eur(),
                usd(),
                dec!(1.10),
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            )
            .unwrap(),
        ]
    }

    fn post(lines: Vec<JournalLineRequest>) -> AccountingResult<JournalEntry> {
        let table = rates();
        let resolver = ExchangeRateResolver::new(&table);
        let cmd = PostJournalEntry {
            description: "test".to_string(),
            reference: "REF-1".to_string(),
            lines,
        };
        JournalEntry::post(
            JournalEntryId::new(),
            &cmd,
            &ctx(),
            usd(),
            &ChartOfAccounts::standard(),
            &resolver,
        )
    }

    #[test]
    fn balanced_entry_is_posted_in_base_currency() {
        let entry = post(vec![
            JournalLineRequest::debit(code("1300"), usd(), dec!(1000)),
            JournalLineRequest::credit(code("2100"), usd(), dec!(1000)),
        ])
        .unwrap();

        assert_eq!(entry.status, JournalStatus::Posted);
        assert_eq!(entry.total_debit(), dec!(1000));
        assert!(entry.is_balanced());
        assert!(entry.lines.iter().all(|l| l.original.is_none()));
        assert_eq!(entry.net_for(&code("1300")), dec!(1000));
        assert_eq!(entry.net_for(&code("2100")), dec!(-1000));
    }

    #[test]
    fn scenario_d_foreign_lines_are_converted_and_keep_originals() {
        let entry = post(vec![
            JournalLineRequest::debit(code("1300"), eur(), dec!(100)),
            JournalLineRequest::credit(code("2100"), usd(), dec!(110)),
        ])
        .unwrap();

        assert_eq!(entry.lines[0].debit, dec!(110.00));
        assert_eq!(entry.lines[0].currency, usd());
        assert_eq!(
            entry.lines[0].original,
            Some(ForeignAmount {
                currency: eur(),
                amount: dec!(100),
                rate: dec!(1.10)
            })
        );
        assert!(entry.is_balanced());
    }

    #[test]
    fn unbalanced_entry_is_rejected() {
        let err = post(vec![
            JournalLineRequest::debit(code("1300"), usd(), dec!(100)),
            JournalLineRequest::credit(code("2100"), usd(), dec!(90)),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            AccountingError::UnbalancedJournal {
                debit: dec!(100.00),
                credit: dec!(90.00)
            }
        );
    }

    #[test]
    fn one_cent_difference_is_tolerated() {
        assert!(post(vec![
            JournalLineRequest::debit(code("1300"), usd(), dec!(100.01)),
            JournalLineRequest::credit(code("2100"), usd(), dec!(100.00)),
        ])
        .is_ok());
    }

    #[test]
    fn rejects_empty_unknown_account_and_non_positive_amounts() {
        assert!(matches!(post(vec![]), Err(AccountingError::Validation(_))));
        assert!(matches!(
            post(vec![
                JournalLineRequest::debit(code("8888"), usd(), dec!(1)),
                JournalLineRequest::credit(code("2100"), usd(), dec!(1)),
            ]),
            Err(AccountingError::UnknownAccount(_))
        ));
        assert!(matches!(
            post(vec![
                JournalLineRequest::debit(code("1300"), usd(), dec!(0)),
                JournalLineRequest::credit(code("2100"), usd(), dec!(0)),
            ]),
            Err(AccountingError::Validation(_))
        ));
    }

    #[test]
    fn missing_rate_fails_the_whole_entry() {
        let gbp = CurrencyCode::new("GBP").unwrap();
        let err = post(vec![
            JournalLineRequest::debit(code("1300"), gbp, dec!(10)),
            JournalLineRequest::credit(code("2100"), usd(), dec!(12)),
        ])
        .unwrap_err();
        assert_eq!(err, AccountingError::MissingExchangeRate { from: gbp, to: usd() });
    }

    #[test]
    fn out_of_range_amounts_are_rejected_not_panicked() {
        assert!(matches!(
            post(vec![
                JournalLineRequest::debit(code("1300"), usd(), Decimal::MAX),
                JournalLineRequest::debit(code("1300"), usd(), Decimal::MAX),
                JournalLineRequest::credit(code("2100"), usd(), dec!(1)),
            ]),
            Err(AccountingError::Validation(_))
        ));
        assert!(matches!(
            post(vec![
                JournalLineRequest::debit(code("1300"), eur(), Decimal::MAX),
                JournalLineRequest::credit(code("2100"), usd(), dec!(1)),
            ]),
            Err(AccountingError::Validation(_))
        ));
    }

    #[test]
    fn amounts_are_rounded_with_bankers_rule() {
        let entry = post(vec![
            JournalLineRequest::debit(code("1300"), usd(), dec!(10.125)),
            JournalLineRequest::credit(code("2100"), usd(), dec!(10.12)),
        ])
        .unwrap();
        assert_eq!(entry.lines[0].debit, dec!(10.12));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any posted entry whose lines were built debit/credit in
        /// pairs balances exactly, including converted foreign lines.
        #[test]
        fn paired_lines_always_balance(
            amounts in prop::collection::vec((1i64..10_000_000i64, any::<bool>()), 1..10)
        ) {
            let mut lines = Vec::new();
            for (cents, foreign) in amounts {
                let amount = Decimal::new(cents, 2);
                if foreign {
                    // Debit the foreign amount, credit its exact base equivalent.
                    let base = round_money(amount * dec!(1.10));
                    lines.push(JournalLineRequest::debit(code("1300"), eur(), amount));
                    lines.push(JournalLineRequest::credit(code("2100"), usd(), base));
                } else {
                    lines.push(JournalLineRequest::debit(code("1300"), usd(), amount));
                    lines.push(JournalLineRequest::credit(code("2100"), usd(), amount));
                }
            }

            let entry = post(lines).unwrap();
            prop_assert_eq!(entry.total_debit(), entry.total_credit());
            for line in &entry.lines {
                prop_assert!((line.debit.is_zero()) != (line.credit.is_zero()));
            }
        }
    }
}
