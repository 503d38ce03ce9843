//! Reference-data commands.

use stockledger_core::{CategoryId, ProductId, UnitId, WarehouseId};
use stockledger_infra::Catalog;
use stockledger_inventory::{Category, Product, ProductDraft, Unit, Warehouse};

use super::{Context, print_json};

pub async fn add_category(ctx: &Context, name: &str) -> anyhow::Result<()> {
    let category = Category::new(CategoryId::new(), name)?;
    ctx.catalog().insert_category(&category).await?;
    tracing::info!(category_id = %category.id_typed(), "category created");
    print_json(&category)
}

pub async fn add_unit(ctx: &Context, name: &str, abbreviation: &str) -> anyhow::Result<()> {
    let unit = Unit::new(UnitId::new(), name, abbreviation)?;
    ctx.catalog().insert_unit(&unit).await?;
    tracing::info!(unit_id = %unit.id_typed(), "unit created");
    print_json(&unit)
}

pub async fn add_warehouse(
    ctx: &Context,
    name: &str,
    location: Option<String>,
    active: bool,
) -> anyhow::Result<()> {
    let warehouse = Warehouse::new(WarehouseId::new(), name, location)?.with_active(active);
    ctx.catalog().insert_warehouse(&warehouse).await?;
    tracing::info!(warehouse_id = %warehouse.id_typed(), active, "warehouse created");
    print_json(&warehouse)
}

pub async fn add_product(ctx: &Context, draft: ProductDraft) -> anyhow::Result<()> {
    let product = Product::new(ProductId::new(), draft)?;
    ctx.catalog().insert_product(&product).await?;
    tracing::info!(product_id = %product.id_typed(), sku = product.sku(), "product created");
    print_json(&product)
}

/// Fails with a conflict while movements still reference the product.
pub async fn remove_product(ctx: &Context, id: ProductId) -> anyhow::Result<()> {
    ctx.catalog().remove_product(id).await?;
    tracing::info!(product_id = %id, "product removed");
    Ok(())
}

pub async fn list_products(ctx: &Context) -> anyhow::Result<()> {
    print_json(&ctx.catalog().list_products().await?)
}

pub async fn list_warehouses(ctx: &Context) -> anyhow::Result<()> {
    print_json(&ctx.catalog().list_warehouses().await?)
}
