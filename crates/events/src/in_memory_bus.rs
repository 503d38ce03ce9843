//! In-process fan-out bus for tests and single-node deployments.

use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug)]
pub enum InMemoryBusError {
    /// The subscriber list lock was poisoned by a panicking publisher.
    Poisoned,
}

/// Broadcast bus over `std::sync::mpsc` channels.
///
/// Subscribers whose receiver has been dropped are pruned on the next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscriber count (as of the last publish).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryBusError::Poisoned)?;
        subs.retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        // A poisoned list still hands out a (silent) subscription.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_gets_every_message() {
        let bus = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(1u32).unwrap();
        bus.publish(2u32).unwrap();

        assert_eq!(a.drain(), vec![1, 2]);
        assert_eq!(b.drain(), vec![1, 2]);
    }

    #[test]
    fn late_subscriber_misses_earlier_messages() {
        let bus = InMemoryEventBus::new();
        bus.publish("early").unwrap();
        let sub = bus.subscribe();
        bus.publish("late").unwrap();
        assert_eq!(sub.drain(), vec!["late"]);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = InMemoryEventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(()).unwrap();

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.drain().len(), 1);
    }
}
