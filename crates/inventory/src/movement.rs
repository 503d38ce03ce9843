//! Stock movements: the only source of truth for stock levels.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, Entity, ProductId, UserId, WarehouseId};

use crate::error::MovementError;

/// Direction of a movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementKind {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl MovementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::In => "IN",
            MovementKind::Out => "OUT",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(MovementKind::In),
            "OUT" => Ok(MovementKind::Out),
            other => Err(DomainError::validation(format!(
                "unknown movement type '{other}' (expected IN or OUT)"
            ))),
        }
    }
}

/// Ledger position assigned by the store on append. Strictly increasing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(i64);

impl MovementId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A strictly positive unit count.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, MovementError> {
        if value <= 0 {
            return Err(MovementError::InvalidQuantity { requested: value });
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = MovementError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Quantity::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

/// Stock-in / stock-out payload as handed over by the request layer.
///
/// `quantity` is signed on purpose: zero and negative inputs must reach
/// [`MovementRequest::validate`] to be rejected as `InvalidQuantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Client-chosen key; a retried request with the same key returns the
    /// original movement instead of appending again.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl MovementRequest {
    pub fn new(product_id: ProductId, warehouse_id: WarehouseId, quantity: i64) -> Self {
        Self {
            product_id,
            warehouse_id,
            quantity,
            reference: None,
            notes: None,
            idempotency_key: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Shape validation only; existence of product/warehouse is checked
    /// against the catalog by the service.
    pub fn validate(self, kind: MovementKind, actor: UserId) -> Result<NewMovement, MovementError> {
        let quantity = Quantity::new(self.quantity)?;
        Ok(NewMovement {
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            kind,
            quantity,
            reference: non_blank(self.reference),
            notes: non_blank(self.notes),
            user_id: actor,
            idempotency_key: non_blank(self.idempotency_key),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A validated movement waiting for the store to assign its id and
/// timestamp. Both are taken inside the store's serialized section, so
/// `created_at` order always agrees with commit order for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub kind: MovementKind,
    pub quantity: Quantity,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub user_id: UserId,
    pub idempotency_key: Option<String>,
}

impl NewMovement {
    /// Freeze into an immutable ledger record.
    pub fn into_recorded(self, id: MovementId, created_at: DateTime<Utc>) -> StockMovement {
        StockMovement {
            id,
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            kind: self.kind,
            quantity: self.quantity,
            reference: self.reference,
            notes: self.notes,
            user_id: self.user_id,
            idempotency_key: self.idempotency_key,
            created_at,
        }
    }

    /// Whether `existing` records the same business request (used when an
    /// idempotency key is replayed). Actor and timestamps are not compared.
    pub fn same_request_as(&self, existing: &StockMovement) -> bool {
        self.product_id == existing.product_id
            && self.warehouse_id == existing.warehouse_id
            && self.kind == existing.kind
            && self.quantity == existing.quantity
            && self.reference == existing.reference
    }
}

/// Immutable ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    id: MovementId,
    product_id: ProductId,
    warehouse_id: WarehouseId,
    #[serde(rename = "type")]
    kind: MovementKind,
    quantity: Quantity,
    reference: Option<String>,
    notes: Option<String>,
    user_id: UserId,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn id_typed(&self) -> MovementId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn kind(&self) -> MovementKind {
        self.kind
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// `+quantity` for IN, `-quantity` for OUT.
    pub fn signed_quantity(&self) -> i64 {
        match self.kind {
            MovementKind::In => self.quantity.get(),
            MovementKind::Out => -self.quantity.get(),
        }
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> &MovementId {
        &self.id
    }
}
