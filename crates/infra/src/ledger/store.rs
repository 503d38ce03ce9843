use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use stockledger_core::{ProductId, WarehouseId};
use stockledger_inventory::{
    AvailabilityCheck, MovementError, MovementKind, NewMovement, StockMovement, StockQuery,
    StockTotals,
};

use super::query::{MovementFilter, MovementPage, Pagination};

/// Outcome of a successful [`LedgerStore::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
    /// A new row was written.
    Created(StockMovement),
    /// The idempotency key was already used for the same request; this is
    /// the original row and nothing was written.
    Replayed(StockMovement),
}

impl Appended {
    pub fn movement(&self) -> &StockMovement {
        match self {
            Appended::Created(m) | Appended::Replayed(m) => m,
        }
    }

    pub fn into_movement(self) -> StockMovement {
        match self {
            Appended::Created(m) | Appended::Replayed(m) => m,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Appended::Replayed(_))
    }
}

/// Ledger store failure.
///
/// `InsufficientStock` and `IdempotencyConflict` are business outcomes of the
/// atomic append; everything else means nothing was committed.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("idempotency key '{0}' already used for a different movement")]
    IdempotencyConflict(String),

    /// The movement references a product the store does not know.
    #[error("product {0} not found")]
    UnknownProduct(ProductId),

    /// The movement references a warehouse the store does not know.
    #[error("warehouse {0} not found")]
    UnknownWarehouse(WarehouseId),

    #[error("ledger invariant violated: {0}")]
    Invariant(String),

    /// Lock or statement timeout; the transaction was rolled back.
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<LedgerError> for MovementError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::InsufficientStock {
                available,
                requested,
            } => MovementError::InsufficientStock {
                available,
                requested,
            },
            LedgerError::IdempotencyConflict(key) => MovementError::IdempotencyConflict(key),
            LedgerError::UnknownProduct(id) => MovementError::ProductNotFound(id),
            LedgerError::UnknownWarehouse(id) => MovementError::WarehouseNotFound(id),
            other => MovementError::Storage(other.to_string()),
        }
    }
}

impl From<MovementError> for LedgerError {
    fn from(value: MovementError) -> Self {
        match value {
            MovementError::InsufficientStock {
                available,
                requested,
            } => LedgerError::InsufficientStock {
                available,
                requested,
            },
            other => LedgerError::Invariant(other.to_string()),
        }
    }
}

/// Append-only movement ledger.
///
/// There is no update or delete: a movement, once appended, is permanent.
///
/// ## Append semantics
///
/// `append` is atomic and serialized per product: the idempotency lookup, the
/// availability check requested by `check`, and the insert happen as one unit
/// that no concurrent append for the same product can interleave with. A
/// rejected or failed append leaves no row behind.
///
/// ## Read semantics
///
/// Aggregates and history reads take no locks and see committed data only.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(
        &self,
        movement: NewMovement,
        check: AvailabilityCheck,
    ) -> Result<Appended, LedgerError>;

    /// Inbound and outbound sums for `query`, read together.
    async fn totals(&self, query: StockQuery) -> Result<StockTotals, LedgerError>;

    /// Σ quantity of one movement kind for `query`.
    async fn sum_quantity(
        &self,
        query: StockQuery,
        kind: MovementKind,
    ) -> Result<i64, LedgerError> {
        Ok(self.totals(query).await?.sum_of(kind))
    }

    /// Current totals of every product that has movements.
    async fn totals_by_product(&self) -> Result<HashMap<ProductId, StockTotals>, LedgerError>;

    /// Current totals of every warehouse that has movements.
    async fn totals_by_warehouse(&self)
    -> Result<HashMap<WarehouseId, StockTotals>, LedgerError>;

    /// Per-day totals (UTC calendar days) for movements in `[from, to)`.
    async fn daily_totals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BTreeMap<NaiveDate, StockTotals>, LedgerError>;

    async fn list_movements(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, LedgerError>;

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<StockMovement>, LedgerError>;
}

#[async_trait::async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn append(
        &self,
        movement: NewMovement,
        check: AvailabilityCheck,
    ) -> Result<Appended, LedgerError> {
        (**self).append(movement, check).await
    }

    async fn totals(&self, query: StockQuery) -> Result<StockTotals, LedgerError> {
        (**self).totals(query).await
    }

    async fn totals_by_product(&self) -> Result<HashMap<ProductId, StockTotals>, LedgerError> {
        (**self).totals_by_product().await
    }

    async fn totals_by_warehouse(
        &self,
    ) -> Result<HashMap<WarehouseId, StockTotals>, LedgerError> {
        (**self).totals_by_warehouse().await
    }

    async fn daily_totals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BTreeMap<NaiveDate, StockTotals>, LedgerError> {
        (**self).daily_totals(from, to).await
    }

    async fn list_movements(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, LedgerError> {
        (**self).list_movements(filter, pagination).await
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<StockMovement>, LedgerError> {
        (**self).find_by_idempotency_key(key).await
    }
}

/// Resolve an idempotency key hit: same request replays, anything else
/// conflicts.
pub(crate) fn replay_or_conflict(
    movement: &NewMovement,
    existing: StockMovement,
) -> Result<Appended, LedgerError> {
    if movement.same_request_as(&existing) {
        Ok(Appended::Replayed(existing))
    } else {
        Err(LedgerError::IdempotencyConflict(
            existing.idempotency_key().unwrap_or_default().to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_references_keep_their_not_found_kind() {
        let product = ProductId::new();
        let warehouse = WarehouseId::new();

        let err: MovementError = LedgerError::UnknownProduct(product).into();
        assert!(matches!(err, MovementError::ProductNotFound(id) if id == product));

        let err: MovementError = LedgerError::UnknownWarehouse(warehouse).into();
        assert!(matches!(err, MovementError::WarehouseNotFound(id) if id == warehouse));
    }

    #[test]
    fn timeouts_surface_as_storage_failures() {
        let err: MovementError = LedgerError::Timeout("lock wait".into()).into();
        assert!(matches!(err, MovementError::Storage(msg) if msg.contains("lock wait")));
    }
}
