//! Stock-in / stock-out execution pipeline.
//!
//! ```text
//! MovementRequest + actor
//!   ↓
//! 1. Validate shape (quantity > 0, blank strings dropped)
//!   ↓
//! 2. Referential checks against the catalog (product, warehouse)
//!   ↓
//! 3. Atomic check-and-append in the ledger store
//!      IN  → no availability check
//!      OUT → on-hand in the configured scope must cover the quantity
//!   ↓
//! 4. Publish the audit event (best effort; the movement is already durable)
//! ```
//!
//! Steps 1 and 2 never touch the ledger, so a rejected request leaves no
//! trace. The service never stamps time: the store assigns `created_at` in
//! step 3 together with the id. Nothing is retried here; `MovementError::is_retryable` tells the
//! caller whether resubmitting is safe.

use tracing::instrument;

use stockledger_core::UserId;
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::{
    AvailabilityCheck, MovementError, MovementKind, MovementRequest, StockEvent, StockMovement,
    StockScope,
};

use crate::catalog::Catalog;
use crate::ledger::{Appended, LedgerStore};

/// Orchestrates validated, atomic stock movements over a ledger store, a
/// catalog and an audit bus.
///
/// - `L`: ledger backend ([`crate::ledger::InMemoryLedgerStore`] or
///   [`crate::ledger::PostgresLedgerStore`])
/// - `C`: reference-data lookup
/// - `B`: audit sink for [`StockEvent`] envelopes
#[derive(Debug)]
pub struct MovementService<L, C, B> {
    ledger: L,
    catalog: C,
    bus: B,
    scope: StockScope,
}

impl<L, C, B> MovementService<L, C, B> {
    pub fn new(ledger: L, catalog: C, bus: B) -> Self {
        Self {
            ledger,
            catalog,
            bus,
            scope: StockScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: StockScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> StockScope {
        self.scope
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<L, C, B> MovementService<L, C, B>
where
    L: LedgerStore,
    C: Catalog,
    B: EventBus<EventEnvelope<StockEvent>>,
{
    /// Append an IN movement. There is no upper bound on quantity.
    pub async fn record_stock_in(
        &self,
        request: MovementRequest,
        actor: UserId,
    ) -> Result<StockMovement, MovementError> {
        Ok(self
            .record_movement(MovementKind::In, request, actor)
            .await?
            .into_movement())
    }

    /// Append an OUT movement if on-hand stock covers it; otherwise fail with
    /// `InsufficientStock` and write nothing.
    pub async fn record_stock_out(
        &self,
        request: MovementRequest,
        actor: UserId,
    ) -> Result<StockMovement, MovementError> {
        Ok(self
            .record_movement(MovementKind::Out, request, actor)
            .await?
            .into_movement())
    }

    /// Full pipeline; the result also tells whether an idempotency key was
    /// replayed.
    #[instrument(
        skip(self, request),
        fields(
            kind = %kind,
            product_id = %request.product_id,
            warehouse_id = %request.warehouse_id,
            quantity = request.quantity,
            actor = %actor,
        ),
        err(Display)
    )]
    pub async fn record_movement(
        &self,
        kind: MovementKind,
        request: MovementRequest,
        actor: UserId,
    ) -> Result<Appended, MovementError> {
        let movement = request.validate(kind, actor)?;

        let product_exists = self
            .catalog
            .product(movement.product_id)
            .await
            .map_err(|e| MovementError::Storage(e.to_string()))?
            .is_some();
        if !product_exists {
            return Err(MovementError::ProductNotFound(movement.product_id));
        }
        let warehouse_exists = self
            .catalog
            .warehouse(movement.warehouse_id)
            .await
            .map_err(|e| MovementError::Storage(e.to_string()))?
            .is_some();
        if !warehouse_exists {
            return Err(MovementError::WarehouseNotFound(movement.warehouse_id));
        }

        let check = match kind {
            MovementKind::In => AvailabilityCheck::None,
            MovementKind::Out => AvailabilityCheck::Require(self.scope),
        };

        let appended = self.ledger.append(movement, check).await.map_err(|e| {
            let err = MovementError::from(e);
            if let MovementError::InsufficientStock {
                available,
                requested,
            } = err
            {
                tracing::info!(available, requested, "stock-out rejected");
            }
            err
        })?;

        if appended.is_replay() {
            tracing::info!(
                movement_id = %appended.movement().id_typed(),
                "idempotent replay; returning original movement"
            );
            return Ok(appended);
        }

        self.publish(appended.movement(), actor);
        Ok(appended)
    }

    fn publish(&self, movement: &StockMovement, actor: UserId) {
        let id = movement.id_typed();
        let envelope = EventEnvelope::wrap(
            movement.product_id(),
            id.value().max(0) as u64,
            actor,
            StockEvent::from_movement(movement),
        );
        if let Err(e) = self.bus.publish(envelope) {
            tracing::warn!(movement_id = %id, error = ?e, "failed to publish stock event");
        }
    }
}
