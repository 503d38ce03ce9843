//! Command implementations. Every command shares one [`Context`]: loaded
//! configuration plus a connection pool.

pub mod catalog;
pub mod movement;
pub mod report;

use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;

use stockledger_events::{EventEnvelope, InMemoryEventBus};
use stockledger_infra::config::LedgerConfig;
use stockledger_infra::db::PgPool;
use stockledger_infra::{
    MovementService, PostgresCatalog, PostgresLedgerStore, ReportService, StockCalculator, db,
};
use stockledger_inventory::StockEvent;

pub type AuditBus = Arc<InMemoryEventBus<EventEnvelope<StockEvent>>>;

pub struct Context {
    pub config: LedgerConfig,
    pub pool: PgPool,
}

impl Context {
    pub async fn connect() -> anyhow::Result<Self> {
        let config = LedgerConfig::load().context("loading configuration")?;
        tracing::debug!(environment = %config.environment, "configuration loaded");

        let pool = db::connect(&config.database)
            .await
            .context("connecting to the database")?;
        Ok(Self { config, pool })
    }

    pub fn ledger(&self) -> PostgresLedgerStore {
        PostgresLedgerStore::new(
            self.pool.clone(),
            self.config.ledger.lock_timeout(),
            self.config.ledger.statement_timeout(),
        )
    }

    pub fn catalog(&self) -> PostgresCatalog {
        PostgresCatalog::new(self.pool.clone())
    }

    pub fn movements(
        &self,
        bus: AuditBus,
    ) -> MovementService<PostgresLedgerStore, PostgresCatalog, AuditBus> {
        MovementService::new(self.ledger(), self.catalog(), bus)
            .with_scope(self.config.ledger.stock_scope)
    }

    pub fn calculator(&self) -> StockCalculator<PostgresLedgerStore> {
        StockCalculator::new(self.ledger())
    }

    pub fn reports(&self) -> ReportService<PostgresLedgerStore, PostgresCatalog> {
        ReportService::new(
            self.ledger(),
            self.catalog(),
            self.config.reports.clone(),
            self.config.ledger.clone(),
        )
    }
}

pub async fn migrate(ctx: &Context) -> anyhow::Result<()> {
    tracing::info!("running migrations");
    db::migrate(&ctx.pool).await?;
    tracing::info!("migrations complete");
    Ok(())
}

/// Pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
