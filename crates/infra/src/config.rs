//! Engine configuration.

use anyhow::{Context, Result, bail};

use stockledger_accounting::{AccountCode, AccountRole, ChartOfAccounts};
use stockledger_core::CurrencyCode;
use stockledger_inventory::ConsumptionOrder;

pub use stockledger_observability::LogFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Currency every balance and journal line is stored in.
    pub base_currency: CurrencyCode,
    /// Lot order for write-off adjustments. Ordinary issues are always FIFO.
    pub write_off_order: ConsumptionOrder,
    pub chart: ChartOfAccounts,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_currency: CurrencyCode::USD,
            write_off_order: ConsumptionOrder::Fifo,
            chart: ChartOfAccounts::standard(),
            log_filter: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl EngineConfig {
    /// Read `STOCKLEDGER_*` variables, falling back to [`EngineConfig::default`].
    ///
    /// - `STOCKLEDGER_BASE_CURRENCY` (e.g. `EUR`)
    /// - `STOCKLEDGER_WRITE_OFF_ORDER` (`fifo` | `lifo`)
    /// - `STOCKLEDGER_LOG` (filter directive), `STOCKLEDGER_LOG_FORMAT` (`json` | `pretty`)
    /// - `STOCKLEDGER_ACCOUNT_<ROLE>` (e.g. `STOCKLEDGER_ACCOUNT_IN_TRANSIT=1350`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Install the process-wide tracing subscriber described by this config.
    pub fn init_logging(&self) {
        stockledger_observability::init_with(&self.log_filter, self.log_format);
    }

    /// Same as [`EngineConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(code) = lookup("STOCKLEDGER_BASE_CURRENCY") {
            config.base_currency = CurrencyCode::new(code.trim())
                .context("STOCKLEDGER_BASE_CURRENCY is invalid")?;
        }

        if let Some(order) = lookup("STOCKLEDGER_WRITE_OFF_ORDER") {
            config.write_off_order = match order.trim().to_ascii_lowercase().as_str() {
                "fifo" => ConsumptionOrder::Fifo,
                "lifo" => ConsumptionOrder::Lifo,
                other => bail!("STOCKLEDGER_WRITE_OFF_ORDER must be fifo or lifo, got '{other}'"),
            };
        }

        if let Some(filter) = lookup("STOCKLEDGER_LOG") {
            config.log_filter = filter;
        }

        if let Some(format) = lookup("STOCKLEDGER_LOG_FORMAT") {
            config.log_format = match format.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => bail!("STOCKLEDGER_LOG_FORMAT must be json or pretty, got '{other}'"),
            };
        }

        for role in AccountRole::ALL {
            let key = format!("STOCKLEDGER_ACCOUNT_{}", role_env_suffix(role));
            if let Some(code) = lookup(&key) {
                let code = AccountCode::new(code.trim())
                    .with_context(|| format!("{key} is invalid"))?;
                config
                    .chart
                    .assign(role, code)
                    .with_context(|| format!("{key} must name an account in the chart"))?;
            }
        }

        Ok(config)
    }
}

fn role_env_suffix(role: AccountRole) -> &'static str {
    match role {
        AccountRole::Inventory => "INVENTORY",
        AccountRole::GoodsReceived => "GOODS_RECEIVED",
        AccountRole::OpeningEquity => "OPENING_EQUITY",
        AccountRole::CostOfGoodsSold => "COGS",
        AccountRole::InventoryAdjustment => "ADJUSTMENT",
        AccountRole::InventoryWriteOff => "WRITE_OFF",
        AccountRole::InTransit => "IN_TRANSIT",
    }
}
