//! Exchange rates and conversion to the base currency.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{CurrencyCode, Money};

use crate::error::{AccountingError, AccountingResult};

/// Rate for one ordered currency pair: `1 from = rate × to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate: Decimal,
    pub effective_at: DateTime<Utc>,
    pub active: bool,
}

impl ExchangeRate {
    pub fn new(
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
        effective_at: DateTime<Utc>,
    ) -> AccountingResult<Self> {
        if from == to {
            return Err(AccountingError::validation("exchange rate currencies must differ"));
        }
        if rate <= Decimal::ZERO {
            return Err(AccountingError::validation("exchange rate must be positive"));
        }
        Ok(Self {
            from,
            to,
            rate,
            effective_at,
            active: true,
        })
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Where rates come from (configuration table, store, feed...).
pub trait ExchangeRateSource {
    /// All known rates for the ordered pair, active or not, in any order.
    fn rates(&self, from: CurrencyCode, to: CurrencyCode) -> Vec<ExchangeRate>;
}

impl ExchangeRateSource for [ExchangeRate] {
    fn rates(&self, from: CurrencyCode, to: CurrencyCode) -> Vec<ExchangeRate> {
        self.iter()
            .filter(|r| r.from == from && r.to == to)
            .cloned()
            .collect()
    }
}

impl ExchangeRateSource for Vec<ExchangeRate> {
    fn rates(&self, from: CurrencyCode, to: CurrencyCode) -> Vec<ExchangeRate> {
        self.as_slice().rates(from, to)
    }
}

/// Result of a conversion. `base_amount` is unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub base_amount: Decimal,
    pub rate: Decimal,
}

/// Picks the latest active rate effective on or before a date.
///
/// Rates are never inverted: converting EUR→USD requires an EUR→USD row even
/// when USD→EUR exists.
pub struct ExchangeRateResolver<'a, S: ExchangeRateSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: ExchangeRateSource + ?Sized> ExchangeRateResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    pub fn rate(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        as_of: DateTime<Utc>,
    ) -> AccountingResult<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        self.source
            .rates(from, to)
            .into_iter()
            .filter(|r| r.active && r.effective_at <= as_of)
            .max_by_key(|r| r.effective_at)
            .map(|r| r.rate)
            .ok_or(AccountingError::MissingExchangeRate { from, to })
    }

    pub fn resolve(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        amount: Decimal,
        as_of: DateTime<Utc>,
    ) -> AccountingResult<Conversion> {
        let rate = self.rate(from, to, as_of)?;
        let base_amount = if from == to {
            amount
        } else {
            amount
                .checked_mul(rate)
                .ok_or_else(|| AccountingError::validation("amount out of range"))?
        };
        Ok(Conversion { base_amount, rate })
    }

    pub fn to_base(
        &self,
        money: &Money,
        base: CurrencyCode,
        as_of: DateTime<Utc>,
    ) -> AccountingResult<Conversion> {
        self.resolve(money.currency, base, money.amount, as_of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn ccy(code: &str) -> CurrencyCode {
        CurrencyCode::new(code).unwrap()
    }

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn table() -> Vec<ExchangeRate> {
        vec![
            ExchangeRate::new(ccy("EUR"), ccy("USD"), dec!(1.08), day(0)).unwrap(),
            ExchangeRate::new(ccy("EUR"), ccy("USD"), dec!(1.10), day(5)).unwrap(),
            ExchangeRate::new(ccy("EUR"), ccy("USD"), dec!(1.50), day(7))
                .unwrap()
                .deactivated(),
            ExchangeRate::new(ccy("EUR"), ccy("USD"), dec!(1.20), day(30)).unwrap(),
        ]
    }

    #[test]
    fn same_currency_is_identity() {
        let rates = table();
        let resolver = ExchangeRateResolver::new(&rates);
        let c = resolver.resolve(ccy("USD"), ccy("USD"), dec!(12.345), day(0)).unwrap();
        assert_eq!(c.base_amount, dec!(12.345));
        assert_eq!(c.rate, Decimal::ONE);
    }

    #[test]
    fn latest_active_rate_on_or_before_date_wins() {
        let rates = table();
        let resolver = ExchangeRateResolver::new(&rates);

        assert_eq!(resolver.rate(ccy("EUR"), ccy("USD"), day(4)).unwrap(), dec!(1.08));
        assert_eq!(resolver.rate(ccy("EUR"), ccy("USD"), day(5)).unwrap(), dec!(1.10));
        // Inactive 1.50 and future 1.20 are both ignored.
        assert_eq!(resolver.rate(ccy("EUR"), ccy("USD"), day(10)).unwrap(), dec!(1.10));

        let c = resolver.resolve(ccy("EUR"), ccy("USD"), dec!(100), day(10)).unwrap();
        assert_eq!(c.base_amount, dec!(110.00));
    }

    #[test]
    fn missing_pair_is_not_inverted() {
        let rates = table();
        let resolver = ExchangeRateResolver::new(&rates);

        let err = resolver.resolve(ccy("USD"), ccy("EUR"), dec!(1), day(10)).unwrap_err();
        assert_eq!(
            err,
            AccountingError::MissingExchangeRate {
                from: ccy("USD"),
                to: ccy("EUR")
            }
        );
        assert!(resolver.rate(ccy("EUR"), ccy("USD"), day(-1)).is_err());
    }

    #[test]
    fn rate_must_be_positive() {
        assert!(ExchangeRate::new(ccy("EUR"), ccy("USD"), dec!(0), day(0)).is_err());
        assert!(ExchangeRate::new(ccy("EUR"), ccy("EUR"), dec!(1), day(0)).is_err());
    }
}
