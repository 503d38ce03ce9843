use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use stockledger_core::{CategoryId, ProductId, UnitId, WarehouseId};
use stockledger_inventory::{Category, Product, Unit, Warehouse};

use super::{Catalog, CatalogError};
use crate::ledger::{LedgerStore, MovementFilter, Pagination};

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, Product>,
    skus: HashMap<String, ProductId>,
    warehouses: HashMap<WarehouseId, Warehouse>,
    categories: HashMap<CategoryId, Category>,
    units: HashMap<UnitId, Unit>,
}

/// In-memory reference data.
///
/// Intended for tests/dev. Enforces the same constraints as the Postgres
/// schema: unique SKU, product category/unit must exist, and a product with
/// movements cannot be removed.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CatalogState>, CatalogError> {
        self.state
            .read()
            .map_err(|_| CatalogError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CatalogState>, CatalogError> {
        self.state
            .write()
            .map_err(|_| CatalogError::Storage("lock poisoned".to_string()))
    }

    pub fn insert_category(&self, category: Category) -> Result<(), CatalogError> {
        self.write()?
            .categories
            .insert(category.id_typed(), category);
        Ok(())
    }

    pub fn insert_unit(&self, unit: Unit) -> Result<(), CatalogError> {
        self.write()?.units.insert(unit.id_typed(), unit);
        Ok(())
    }

    pub fn insert_warehouse(&self, warehouse: Warehouse) -> Result<(), CatalogError> {
        self.write()?
            .warehouses
            .insert(warehouse.id_typed(), warehouse);
        Ok(())
    }

    pub fn insert_product(&self, product: Product) -> Result<(), CatalogError> {
        let mut state = self.write()?;

        if !state.categories.contains_key(&product.category_id()) {
            return Err(CatalogError::Conflict(format!(
                "category {} does not exist",
                product.category_id()
            )));
        }
        if !state.units.contains_key(&product.unit_id()) {
            return Err(CatalogError::Conflict(format!(
                "unit {} does not exist",
                product.unit_id()
            )));
        }
        if let Some(owner) = state.skus.get(product.sku()) {
            if *owner != product.id_typed() {
                return Err(CatalogError::Conflict(format!(
                    "sku '{}' already used by product {owner}",
                    product.sku()
                )));
            }
        }

        // Re-inserting an existing id may change its SKU.
        if let Some(previous) = state.products.get(&product.id_typed()) {
            let old_sku = previous.sku().to_string();
            state.skus.remove(&old_sku);
        }
        state
            .skus
            .insert(product.sku().to_string(), product.id_typed());
        state.products.insert(product.id_typed(), product);
        Ok(())
    }

    /// Remove a product that has never moved.
    ///
    /// The ledger check and the removal are two separate steps; callers must
    /// not record movements for `id` concurrently.
    pub async fn remove_product<L>(&self, id: ProductId, ledger: &L) -> Result<Product, CatalogError>
    where
        L: LedgerStore + ?Sized,
    {
        let page = ledger
            .list_movements(MovementFilter::product(id), Pagination::new(Some(1), None))
            .await
            .map_err(|e| CatalogError::Storage(e.to_string()))?;
        if page.total > 0 {
            return Err(CatalogError::Conflict(format!(
                "product {id} is referenced by {} movement(s)",
                page.total
            )));
        }

        let mut state = self.write()?;
        let product = state
            .products
            .remove(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("product {id}")))?;
        state.skus.remove(product.sku());
        Ok(product)
    }
}

fn sorted_by_name<T>(items: impl Iterator<Item = T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    let mut out: Vec<T> = items.collect();
    out.sort_by(|a, b| name(a).cmp(name(b)));
    out
}

#[async_trait::async_trait]
impl Catalog for InMemoryCatalog {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, CatalogError> {
        Ok(self.read()?.warehouses.get(&id).cloned())
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>, CatalogError> {
        Ok(self.read()?.categories.get(&id).cloned())
    }

    async fn unit(&self, id: UnitId) -> Result<Option<Unit>, CatalogError> {
        Ok(self.read()?.units.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let state = self.read()?;
        Ok(sorted_by_name(state.products.values().cloned(), Product::name))
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, CatalogError> {
        let state = self.read()?;
        Ok(sorted_by_name(state.warehouses.values().cloned(), Warehouse::name))
    }

    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        let state = self.read()?;
        Ok(sorted_by_name(state.categories.values().cloned(), Category::name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockledger_core::UserId;
    use stockledger_inventory::{AvailabilityCheck, MovementKind, MovementRequest, ProductDraft};

    use crate::ledger::InMemoryLedgerStore;

    fn seeded() -> (InMemoryCatalog, CategoryId, UnitId) {
        let catalog = InMemoryCatalog::new();
        let category = Category::new(CategoryId::new(), "Hardware").unwrap();
        let unit = Unit::new(UnitId::new(), "Piece", "pcs").unwrap();
        let (c, u) = (category.id_typed(), unit.id_typed());
        catalog.insert_category(category).unwrap();
        catalog.insert_unit(unit).unwrap();
        (catalog, c, u)
    }

    fn product(sku: &str, category_id: CategoryId, unit_id: UnitId) -> Product {
        Product::new(
            ProductId::new(),
            ProductDraft {
                sku: sku.to_string(),
                name: format!("Product {sku}"),
                category_id,
                unit_id,
                cost_price: dec!(1.00),
                sell_price: dec!(2.00),
                min_stock: 0,
            },
        )
        .unwrap()
    }

    #[test]
    fn duplicate_sku_is_a_conflict() {
        let (catalog, c, u) = seeded();
        catalog.insert_product(product("A-1", c, u)).unwrap();
        let err = catalog.insert_product(product("A-1", c, u)).unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[test]
    fn product_requires_known_category() {
        let (catalog, _, u) = seeded();
        let err = catalog
            .insert_product(product("A-2", CategoryId::new(), u))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[tokio::test]
    async fn product_with_movements_cannot_be_removed() {
        let (catalog, c, u) = seeded();
        let ledger = InMemoryLedgerStore::new();
        let moved = product("M-1", c, u);
        let idle = product("I-1", c, u);
        let (moved_id, idle_id) = (moved.id_typed(), idle.id_typed());
        catalog.insert_product(moved).unwrap();
        catalog.insert_product(idle).unwrap();

        let m = MovementRequest::new(moved_id, WarehouseId::new(), 1)
            .validate(MovementKind::In, UserId::new())
            .unwrap();
        ledger.append(m, AvailabilityCheck::None).await.unwrap();

        let err = catalog.remove_product(moved_id, &ledger).await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
        assert!(catalog.product(moved_id).await.unwrap().is_some());

        catalog.remove_product(idle_id, &ledger).await.unwrap();
        assert!(catalog.product(idle_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listings_are_sorted_by_name() {
        let catalog = InMemoryCatalog::new();
        for name in ["Zeta", "Alpha", "Mid"] {
            catalog
                .insert_warehouse(Warehouse::new(WarehouseId::new(), name, None).unwrap())
                .unwrap();
        }
        let names: Vec<String> = catalog
            .list_warehouses()
            .await
            .unwrap()
            .iter()
            .map(|w| w.name().to_string())
            .collect();
        assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
    }
}
