use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{ProductId, UserId};

use crate::event::Event;

/// Delivery wrapper for a committed event.
///
/// - `stream` is the product whose stock changed.
/// - `sequence_number` is the ledger position (movement id) of the change, so
///   consumers can deduplicate at-least-once deliveries.
/// - `actor` is whoever caused the change; audit consumers record it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    event_type: String,
    stream: ProductId,
    sequence_number: u64,
    actor: UserId,
    recorded_at: DateTime<Utc>,
    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap `payload`, taking the type and time from the event itself.
    pub fn wrap(stream: ProductId, sequence_number: u64, actor: UserId, payload: E) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: payload.event_type().to_string(),
            stream,
            sequence_number,
            actor,
            recorded_at: payload.occurred_at(),
            payload,
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn stream(&self) -> ProductId {
        self.stream
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Ping {
        at: DateTime<Utc>,
    }

    impl Event for Ping {
        fn event_type(&self) -> &'static str {
            "test.ping"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn wrap_copies_event_metadata() {
        let at = Utc::now();
        let product = ProductId::new();
        let actor = UserId::new();
        let env = EventEnvelope::wrap(product, 7, actor, Ping { at });

        assert_eq!(env.event_type(), "test.ping");
        assert_eq!(env.recorded_at(), at);
        assert_eq!(env.stream(), product);
        assert_eq!(env.sequence_number(), 7);
        assert_eq!(env.actor(), actor);

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["event_type"], "test.ping");
    }
}
