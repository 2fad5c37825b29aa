//! Process-local bus: committed ledger events fan out to std channels, each
//! subscriber optionally narrowed by a filter.

use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, Subscription};
use crate::envelope::EventEnvelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InMemoryBusError {
    #[error("subscriber registry lock poisoned")]
    Poisoned,
}

type Filter<M> = Box<dyn Fn(&M) -> bool + Send>;

struct Subscriber<M> {
    sender: mpsc::Sender<M>,
    filter: Option<Filter<M>>,
}

impl<M: Clone> Subscriber<M> {
    /// Returns `false` once the receiving side is gone.
    fn deliver(&self, message: &M) -> bool {
        match &self.filter {
            Some(accepts) if !accepts(message) => true,
            _ => self.sender.send(message.clone()).is_ok(),
        }
    }
}

/// Fan-out bus backed by `mpsc` channels.
///
/// Subscribers whose receiver has been dropped are pruned on the next
/// publish.
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<Subscriber<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Subscribe to the messages `filter` accepts.
    ///
    /// A dropped filtered subscription is pruned on the next message its
    /// filter accepts.
    pub fn subscribe_where(&self, filter: impl Fn(&M) -> bool + Send + 'static) -> Subscription<M> {
        self.register(Some(Box::new(filter)))
    }

    fn register(&self, filter: Option<Filter<M>>) -> Subscription<M> {
        let (sender, receiver) = mpsc::channel();
        // Poisoned registry: the subscription stays silent.
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(Subscriber { sender, filter });
        }
        Subscription::new(receiver)
    }
}

impl<E: 'static> InMemoryEventBus<EventEnvelope<E>> {
    /// Subscribe to one event family by type prefix, e.g. `"inventory.transfer"`.
    pub fn subscribe_to(&self, family: impl Into<String>) -> Subscription<EventEnvelope<E>> {
        let family = family.into();
        self.subscribe_where(move |envelope| envelope.event_type().starts_with(family.as_str()))
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> core::fmt::Debug for InMemoryEventBus<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryEventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        self.subscribers
            .lock()
            .map_err(|_| InMemoryBusError::Poisoned)?
            .retain(|subscriber| subscriber.deliver(&message));
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        self.register(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn every_subscriber_receives_every_message() {
        let bus = InMemoryEventBus::<u32>::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(1).unwrap();
        bus.publish(2).unwrap();

        assert_eq!(a.drain(), vec![1, 2]);
        assert_eq!(b.drain(), vec![1, 2]);
    }

    #[test]
    fn filtered_subscribers_only_see_accepted_messages() {
        let bus = InMemoryEventBus::<u32>::new();
        let even = bus.subscribe_where(|n| n % 2 == 0);
        let all = bus.subscribe();

        for n in 1..=4 {
            bus.publish(n).unwrap();
        }

        assert_eq!(even.drain(), vec![2, 4]);
        assert_eq!(all.drain(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn family_subscription_matches_event_type_prefix() {
        let bus = InMemoryEventBus::<EventEnvelope<serde_json::Value>>::new();
        let transfers = bus.subscribe_to("inventory.transfer");

        let envelope = |event_type: &str, sequence: u64| {
            EventEnvelope::new(
                Uuid::now_v7(),
                Uuid::now_v7(),
                "stock_transfer",
                event_type,
                sequence,
                Utc::now(),
                json!({}),
            )
        };
        bus.publish(envelope("inventory.transfer.shipped", 1)).unwrap();
        bus.publish(envelope("inventory.movement.applied", 2)).unwrap();

        let seen = transfers.drain();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].event_type(), "inventory.transfer.shipped");
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = InMemoryEventBus::<u32>::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        drop(bus.subscribe_where(|n| *n > 10));
        assert_eq!(bus.subscriber_count(), 3);

        bus.publish(7).unwrap();
        assert_eq!(bus.subscriber_count(), 2);
        assert_eq!(kept.try_recv().unwrap(), 7);

        bus.publish(11).unwrap();
        assert_eq!(bus.subscriber_count(), 1);
    }
}
