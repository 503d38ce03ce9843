//! Configuration loading.
//!
//! Sources, lowest precedence first:
//! 1. Defaults in code
//! 2. `config/{environment}.toml` (optional)
//! 3. Environment variables with the `STOCKLEDGER__` prefix, e.g.
//!    `STOCKLEDGER__LEDGER__STOCK_SCOPE=per_warehouse`

use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use stockledger_inventory::StockScope;

use crate::ledger::Pagination;

pub const ENV_PREFIX: &str = "STOCKLEDGER";

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Current environment (development, test, production)
    pub environment: String,

    pub database: DatabaseConfig,

    pub ledger: LedgerSettings,

    pub reports: ReportSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    pub max_connections: u32,

    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerSettings {
    /// Pool a stock-out is checked against.
    pub stock_scope: StockScope,

    /// Upper bound on waiting for the per-product lock.
    pub lock_timeout_ms: u64,

    /// Upper bound on any single statement of an append, the stock sum
    /// included. Must not be shorter than the lock timeout.
    pub statement_timeout_ms: u64,

    pub default_page_size: u32,

    pub max_page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportSettings {
    /// Label attached to valuation figures; amounts are single-currency.
    pub currency: String,

    /// Number of calendar days in the stock trend, ending today.
    pub trend_days: u32,
}

impl LedgerSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    /// Clamp a caller-supplied page request to the configured bounds.
    pub fn pagination(&self, limit: Option<u32>, offset: Option<u32>) -> Pagination {
        Pagination::bounded(limit, offset, self.default_page_size, self.max_page_size)
    }
}

impl LedgerConfig {
    /// Load configuration from files and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var(format!("{ENV_PREFIX}_ENVIRONMENT"))
            .unwrap_or_else(|_| "development".into());

        Self::builder(&environment)?
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    /// Builder pre-seeded with every default; callers layer their own sources.
    pub fn builder(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("environment", environment)?
            .set_default("database.url", "postgres://localhost:5432/stockledger")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("ledger.stock_scope", "global")?
            .set_default("ledger.lock_timeout_ms", 5000)?
            .set_default("ledger.statement_timeout_ms", 15000)?
            .set_default("ledger.default_page_size", 50)?
            .set_default("ledger.max_page_size", 1000)?
            .set_default("reports.currency", "USD")?
            .set_default("reports.trend_days", 7)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.ledger.lock_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "ledger.lock_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.ledger.statement_timeout_ms < self.ledger.lock_timeout_ms {
            return Err(ConfigError::Message(
                "ledger.statement_timeout_ms must be at least ledger.lock_timeout_ms".into(),
            ));
        }
        if self.ledger.default_page_size == 0
            || self.ledger.default_page_size > self.ledger.max_page_size
        {
            return Err(ConfigError::Message(format!(
                "ledger.default_page_size must be in 1..={}",
                self.ledger.max_page_size
            )));
        }
        if self.reports.trend_days == 0 {
            return Err(ConfigError::Message(
                "reports.trend_days must be at least 1".into(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message(
                "database.min_connections exceeds database.max_connections".into(),
            ));
        }
        Ok(self)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            database: DatabaseConfig {
                url: "postgres://localhost:5432/stockledger".into(),
                max_connections: 10,
                min_connections: 2,
            },
            ledger: LedgerSettings {
                stock_scope: StockScope::Global,
                lock_timeout_ms: 5000,
                statement_timeout_ms: 15000,
                default_page_size: 50,
                max_page_size: 1000,
            },
            reports: ReportSettings {
                currency: "USD".into(),
                trend_days: 7,
            },
        }
    }
}
