//! Publish/subscribe abstraction for committed events.
//!
//! The bus distributes; it does not store. Everything published here has
//! already been committed to the ledger, so a lost or duplicated delivery can
//! always be repaired by re-reading the ledger. Consumers must tolerate
//! duplicates (at-least-once) and should key on
//! [`EventEnvelope::sequence_number`](crate::EventEnvelope::sequence_number).

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Receiving end of one subscriber.
///
/// Each subscription sees every message published after it was created.
/// Meant to be drained by a single consumer thread:
///
/// ```ignore
/// let sub = bus.subscribe();
/// loop {
///     match sub.recv_timeout(Duration::from_secs(1)) {
///         Ok(envelope) => audit_log.write(&envelope)?,
///         Err(RecvTimeoutError::Timeout) => continue,
///         Err(RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything already queued, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic event sink.
///
/// `publish` may fail (closed transport, poisoned lock); the caller decides
/// whether that matters. The movement service treats it as non-fatal because
/// the movement is already durable.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
