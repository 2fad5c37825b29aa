use std::sync::RwLock;

use stockledger_accounting::{ExchangeRate, ExchangeRateSource};
use stockledger_core::CurrencyCode;

/// Mutable in-memory exchange-rate table.
#[derive(Debug, Default)]
pub struct InMemoryRateTable {
    rates: RwLock<Vec<ExchangeRate>>,
}

impl InMemoryRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, rate: ExchangeRate) {
        self.rates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(rate);
    }

    /// Mark every rate for the pair inactive.
    pub fn deactivate(&self, from: CurrencyCode, to: CurrencyCode) {
        let mut rates = self
            .rates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for r in rates.iter_mut().filter(|r| r.from == from && r.to == to) {
            r.active = false;
        }
    }
}

impl ExchangeRateSource for InMemoryRateTable {
    fn rates(&self, from: CurrencyCode, to: CurrencyCode) -> Vec<ExchangeRate> {
        self.rates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_slice()
            .rates(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use stockledger_accounting::ExchangeRateResolver;

    #[test]
    fn deactivated_pairs_stop_resolving() {
        let table = InMemoryRateTable::new();
        table.insert(ExchangeRate::new(CurrencyCode::EUR, CurrencyCode::USD, dec!(1.1), Utc::now()).unwrap());

        let resolver = ExchangeRateResolver::new(&table);
        assert!(resolver.rate(CurrencyCode::EUR, CurrencyCode::USD, Utc::now()).is_ok());

        table.deactivate(CurrencyCode::EUR, CurrencyCode::USD);
        assert!(resolver.rate(CurrencyCode::EUR, CurrencyCode::USD, Utc::now()).is_err());
    }
}
