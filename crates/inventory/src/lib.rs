//! Inventory domain: reference data, stock movements, and stock arithmetic.
//!
//! Everything here is deterministic and IO-free. The infrastructure crate
//! persists movements and enforces atomicity; this crate decides what a
//! valid movement is and how stock is derived from a set of them.

pub mod catalog;
pub mod error;
pub mod event;
pub mod movement;
pub mod stock;

pub use catalog::{Category, Product, ProductDraft, Unit, Warehouse};
pub use error::{ErrorKind, MovementError};
pub use event::{MovementRecorded, StockEvent};
pub use movement::{MovementId, MovementKind, MovementRequest, NewMovement, Quantity, StockMovement};
pub use stock::{AvailabilityCheck, StockQuery, StockScope, StockTotals};
