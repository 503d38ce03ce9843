//! Append-only movement ledger: store trait, history queries and the
//! in-memory and Postgres backends.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use in_memory::{CounterMismatch, InMemoryLedgerStore, ReconciliationReport};
pub use postgres::PostgresLedgerStore;
pub use query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MovementFilter, MovementPage, Pagination};
pub use store::{Appended, LedgerError, LedgerStore};
