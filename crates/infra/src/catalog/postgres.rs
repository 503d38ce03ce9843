//! Postgres-backed reference data.
//!
//! Uniqueness (SKU) and deletion protection (`ON DELETE RESTRICT` from
//! `stock_movements`) are enforced by the schema; violations surface as
//! [`CatalogError::Conflict`].

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use stockledger_core::{CategoryId, ProductId, UnitId, WarehouseId};
use stockledger_inventory::{Category, Product, ProductDraft, Unit, Warehouse};

use super::{Catalog, CatalogError};

#[derive(Debug, Clone)]
pub struct PostgresCatalog {
    pool: Arc<PgPool>,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn insert_category(&self, category: &Category) -> Result<(), CatalogError> {
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
            .bind(category.id_typed().as_uuid())
            .bind(category.name())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    pub async fn insert_unit(&self, unit: &Unit) -> Result<(), CatalogError> {
        sqlx::query("INSERT INTO units (id, name, abbreviation) VALUES ($1, $2, $3)")
            .bind(unit.id_typed().as_uuid())
            .bind(unit.name())
            .bind(unit.abbreviation())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_unit", e))?;
        Ok(())
    }

    pub async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), CatalogError> {
        sqlx::query(
            "INSERT INTO warehouses (id, name, location, is_active) VALUES ($1, $2, $3, $4)",
        )
        .bind(warehouse.id_typed().as_uuid())
        .bind(warehouse.name())
        .bind(warehouse.location())
        .bind(warehouse.is_active())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_warehouse", e))?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(product_id = %product.id_typed(), sku = product.sku()), err)]
    pub async fn insert_product(&self, product: &Product) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, category_id, unit_id, cost_price, sell_price, min_stock
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.sku())
        .bind(product.name())
        .bind(product.category_id().as_uuid())
        .bind(product.unit_id().as_uuid())
        .bind(product.cost_price().amount())
        .bind(product.sell_price().amount())
        .bind(product.min_stock())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    /// Fails with `Conflict` while any movement references the product.
    #[instrument(skip(self), err)]
    pub async fn remove_product(&self, id: ProductId) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_product", e))?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(format!("product {id}")));
        }
        Ok(())
    }
}

const PRODUCT_COLUMNS: &str =
    "id, sku, name, category_id, unit_id, cost_price, sell_price, min_stock";

#[async_trait::async_trait]
impl Catalog for PostgresCatalog {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, CatalogError> {
        let row = sqlx::query("SELECT id, name, location, is_active FROM warehouses WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("warehouse", e))?;
        row.as_ref().map(warehouse_from_row).transpose()
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>, CatalogError> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("category", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn unit(&self, id: UnitId) -> Result<Option<Unit>, CatalogError> {
        let row = sqlx::query("SELECT id, name, abbreviation FROM units WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("unit", e))?;
        row.as_ref()
            .map(|row| -> Result<_, CatalogError> {
                let id: uuid::Uuid = row.try_get("id").map_err(read_err)?;
                let name: String = row.try_get("name").map_err(read_err)?;
                let abbreviation: String = row.try_get("abbreviation").map_err(read_err)?;
                Ok(Unit::new(UnitId::from_uuid(id), &name, &abbreviation)?)
            })
            .transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name, id");
        sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?
            .iter()
            .map(product_from_row)
            .collect()
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, CatalogError> {
        sqlx::query("SELECT id, name, location, is_active FROM warehouses ORDER BY name, id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_warehouses", e))?
            .iter()
            .map(warehouse_from_row)
            .collect()
    }

    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        sqlx::query("SELECT id, name FROM categories ORDER BY name, id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?
            .iter()
            .map(category_from_row)
            .collect()
    }
}

fn read_err(e: sqlx::Error) -> CatalogError {
    CatalogError::Storage(format!("failed to read row: {e}"))
}

fn product_from_row(row: &PgRow) -> Result<Product, CatalogError> {
    let id: uuid::Uuid = row.try_get("id").map_err(read_err)?;
    let cost_price: Decimal = row.try_get("cost_price").map_err(read_err)?;
    let sell_price: Decimal = row.try_get("sell_price").map_err(read_err)?;
    let draft = ProductDraft {
        sku: row.try_get("sku").map_err(read_err)?,
        name: row.try_get("name").map_err(read_err)?,
        category_id: CategoryId::from_uuid(row.try_get("category_id").map_err(read_err)?),
        unit_id: UnitId::from_uuid(row.try_get("unit_id").map_err(read_err)?),
        cost_price,
        sell_price,
        min_stock: row.try_get("min_stock").map_err(read_err)?,
    };
    Ok(Product::new(ProductId::from_uuid(id), draft)?)
}

fn warehouse_from_row(row: &PgRow) -> Result<Warehouse, CatalogError> {
    let id: uuid::Uuid = row.try_get("id").map_err(read_err)?;
    let name: String = row.try_get("name").map_err(read_err)?;
    let location: Option<String> = row.try_get("location").map_err(read_err)?;
    let is_active: bool = row.try_get("is_active").map_err(read_err)?;
    Ok(Warehouse::new(WarehouseId::from_uuid(id), &name, location)?.with_active(is_active))
}

fn category_from_row(row: &PgRow) -> Result<Category, CatalogError> {
    let id: uuid::Uuid = row.try_get("id").map_err(read_err)?;
    let name: String = row.try_get("name").map_err(read_err)?;
    Ok(Category::new(CategoryId::from_uuid(id), &name)?)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CatalogError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                // unique / foreign key
                Some("23505") | Some("23503") => CatalogError::Conflict(msg),
                Some("23514") => CatalogError::Validation(msg),
                _ => CatalogError::Storage(msg),
            }
        }
        other => CatalogError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}
