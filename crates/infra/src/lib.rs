//! Infrastructure layer: ledger stores, catalog, movement service, reports,
//! configuration and database wiring.

pub mod catalog;
pub mod config;
pub mod db;
pub mod ledger;
pub mod movement_service;
pub mod reports;
pub mod stock_calculator;


pub use catalog::{Catalog, CatalogError, InMemoryCatalog, PostgresCatalog};
pub use config::LedgerConfig;
pub use ledger::{
    Appended, InMemoryLedgerStore, LedgerError, LedgerStore, MovementFilter, MovementPage,
    Pagination, PostgresLedgerStore,
};
pub use movement_service::MovementService;
pub use reports::{ReportError, ReportService};
pub use stock_calculator::StockCalculator;
