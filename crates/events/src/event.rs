use chrono::{DateTime, Utc};

/// A fact that already happened.
///
/// Events are immutable, carry a schema version, and are only ever emitted
/// after the state change they describe has been committed.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name (e.g. "inventory.stock.received").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Business time of the underlying change.
    fn occurred_at(&self) -> DateTime<Utc>;
}
