//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the inventory and
//! infrastructure crates: identifiers, the domain error model, and value
//! objects such as [`Money`]. No IO lives here.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CategoryId, ProductId, UnitId, UserId, WarehouseId};
pub use value_object::{Money, ValueObject};
