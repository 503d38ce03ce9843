use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, UserId, WarehouseId};
use stockledger_events::Event;

use crate::movement::{MovementId, MovementKind, StockMovement};

/// Snapshot of a committed movement, as seen by audit consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecorded {
    pub movement_id: MovementId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub reference: Option<String>,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Emitted by the movement service after the ledger append commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "movement")]
pub enum StockEvent {
    #[serde(rename = "STOCK_IN")]
    Received(MovementRecorded),
    #[serde(rename = "STOCK_OUT")]
    Issued(MovementRecorded),
}

impl StockEvent {
    pub fn from_movement(movement: &StockMovement) -> Self {
        let recorded = MovementRecorded {
            movement_id: movement.id_typed(),
            product_id: movement.product_id(),
            warehouse_id: movement.warehouse_id(),
            quantity: movement.quantity().get(),
            reference: movement.reference().map(str::to_string),
            user_id: movement.user_id(),
            occurred_at: movement.created_at(),
        };
        match movement.kind() {
            MovementKind::In => StockEvent::Received(recorded),
            MovementKind::Out => StockEvent::Issued(recorded),
        }
    }

    pub fn movement(&self) -> &MovementRecorded {
        match self {
            StockEvent::Received(m) | StockEvent::Issued(m) => m,
        }
    }
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::Received(_) => "inventory.stock.received",
            StockEvent::Issued(_) => "inventory.stock.issued",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.movement().occurred_at
    }
}
