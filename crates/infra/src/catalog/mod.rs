//! Reference-data lookup: the products, warehouses, categories and units the
//! ledger points at.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use thiserror::Error;

use stockledger_core::{CategoryId, DomainError, ProductId, UnitId, WarehouseId};
use stockledger_inventory::{Category, Product, Unit, Warehouse};

pub use in_memory::InMemoryCatalog;
pub use postgres::PostgresCatalog;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Duplicate SKU, dangling reference, or a product still referenced by
    /// movements.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DomainError> for CatalogError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                CatalogError::Validation(msg)
            }
            DomainError::Conflict(msg) => CatalogError::Conflict(msg),
            DomainError::InvariantViolation(msg) => CatalogError::Storage(msg),
        }
    }
}

/// Read side of the reference data. Lookups return `None` for unknown ids.
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, CatalogError>;

    async fn warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, CatalogError>;

    async fn category(&self, id: CategoryId) -> Result<Option<Category>, CatalogError>;

    async fn unit(&self, id: UnitId) -> Result<Option<Unit>, CatalogError>;

    /// Ordered by name.
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError>;

    /// Ordered by name.
    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, CatalogError>;

    /// Ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError>;
}

#[async_trait::async_trait]
impl<C> Catalog for Arc<C>
where
    C: Catalog + ?Sized,
{
    async fn product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        (**self).product(id).await
    }

    async fn warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, CatalogError> {
        (**self).warehouse(id).await
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>, CatalogError> {
        (**self).category(id).await
    }

    async fn unit(&self, id: UnitId) -> Result<Option<Unit>, CatalogError> {
        (**self).unit(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        (**self).list_products().await
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, CatalogError> {
        (**self).list_warehouses().await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        (**self).list_categories().await
    }
}
