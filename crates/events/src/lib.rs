//! Event primitives: the `Event` trait, envelopes, and a pub/sub bus.
//!
//! The ledger itself is the source of truth; events exist so side effects
//! (audit trail, notifications) can observe committed movements without the
//! ledger depending on them.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
