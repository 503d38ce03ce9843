//! Reference data the ledger points at: products, warehouses, categories, units.
//!
//! These are long-lived records administered outside the ledger. Current stock
//! is deliberately absent from [`Product`]; it is always derived from
//! movements.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    CategoryId, DomainError, DomainResult, Entity, Money, ProductId, UnitId, WarehouseId,
};

fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Unvalidated product attributes, as received from an admin form or import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub sku: String,
    pub name: String,
    pub category_id: CategoryId,
    pub unit_id: UnitId,
    pub cost_price: Decimal,
    pub sell_price: Decimal,
    pub min_stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    category_id: CategoryId,
    unit_id: UnitId,
    cost_price: Money,
    sell_price: Money,
    min_stock: i64,
}

impl Product {
    /// Validate a draft: non-empty sku/name, prices `>= 0`, `min_stock >= 0`.
    pub fn new(id: ProductId, draft: ProductDraft) -> DomainResult<Self> {
        if draft.min_stock < 0 {
            return Err(DomainError::validation(format!(
                "min_stock cannot be negative (got {})",
                draft.min_stock
            )));
        }
        Ok(Self {
            id,
            sku: required("sku", &draft.sku)?,
            name: required("name", &draft.name)?,
            category_id: draft.category_id,
            unit_id: draft.unit_id,
            cost_price: Money::price(draft.cost_price)?,
            sell_price: Money::price(draft.sell_price)?,
            min_stock: draft.min_stock,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    pub fn cost_price(&self) -> Money {
        self.cost_price
    }

    pub fn sell_price(&self) -> Money {
        self.sell_price
    }

    pub fn min_stock(&self) -> i64 {
        self.min_stock
    }

    /// At or below the reorder threshold.
    pub fn is_low_stock(&self, on_hand: i64) -> bool {
        on_hand <= self.min_stock
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &ProductId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    id: WarehouseId,
    name: String,
    location: Option<String>,
    is_active: bool,
}

impl Warehouse {
    /// New warehouses start active.
    pub fn new(id: WarehouseId, name: &str, location: Option<String>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required("warehouse name", name)?,
            location: optional(location),
            is_active: true,
        })
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn id_typed(&self) -> WarehouseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Entity for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> &WarehouseId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: String,
}

impl Category {
    pub fn new(id: CategoryId, name: &str) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required("category name", name)?,
        })
    }

    pub fn id_typed(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &CategoryId {
        &self.id
    }
}

/// Unit of measure (e.g. "Piece" / "pcs").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    id: UnitId,
    name: String,
    abbreviation: String,
}

impl Unit {
    pub fn new(id: UnitId, name: &str, abbreviation: &str) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required("unit name", name)?,
            abbreviation: required("unit abbreviation", abbreviation)?,
        })
    }

    pub fn id_typed(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abbreviation(&self) -> &str {
        &self.abbreviation
    }
}

impl Entity for Unit {
    type Id = UnitId;

    fn id(&self) -> &UnitId {
        &self.id
    }
}
