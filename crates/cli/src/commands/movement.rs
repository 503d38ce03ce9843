//! Stock-in / stock-out and stock lookups.

use std::sync::Arc;

use serde::Serialize;

use stockledger_core::UserId;
use stockledger_events::{EventBus, InMemoryEventBus};
use stockledger_inventory::{MovementKind, MovementRequest, StockMovement, StockQuery};

use super::{AuditBus, Context, print_json};

#[derive(Serialize)]
struct Recorded<'a> {
    replayed: bool,
    movement: &'a StockMovement,
}

#[derive(Serialize)]
struct StockLevel {
    #[serde(flatten)]
    query: StockQuery,
    stock_in: i64,
    stock_out: i64,
    on_hand: i64,
}

pub async fn record(
    ctx: &Context,
    kind: MovementKind,
    request: MovementRequest,
    actor: UserId,
) -> anyhow::Result<()> {
    let bus: AuditBus = Arc::new(InMemoryEventBus::new());
    let audit = bus.subscribe();
    let service = ctx.movements(bus);

    let appended = service.record_movement(kind, request, actor).await?;

    for envelope in audit.drain() {
        tracing::info!(
            event_type = envelope.event_type(),
            product_id = %envelope.stream(),
            sequence = envelope.sequence_number(),
            actor = %envelope.actor(),
            "audit"
        );
    }

    print_json(&Recorded {
        replayed: appended.is_replay(),
        movement: appended.movement(),
    })
}

pub async fn stock(ctx: &Context, query: StockQuery) -> anyhow::Result<()> {
    let totals = ctx.calculator().totals(query).await?;
    print_json(&StockLevel {
        query,
        stock_in: totals.sum_of(MovementKind::In),
        stock_out: totals.sum_of(MovementKind::Out),
        on_hand: totals.on_hand(),
    })
}
