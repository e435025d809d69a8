use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{Audience, FanoutError, Publisher, RealtimeEvent, Result};

/// Default capacity of the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// One event addressed to one audience.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub audience: Audience,
    pub event: RealtimeEvent,
}

/// In-process publisher backed by a tokio broadcast channel.
///
/// Socket sessions call [`BroadcastHub::subscribe`] with the rooms they
/// joined and forward whatever their [`Subscription`] yields.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<Envelope>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribes to events addressed to any of `audiences`.
    pub fn subscribe(&self, audiences: impl IntoIterator<Item = Audience>) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            audiences: audiences.into_iter().collect(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Publisher for BroadcastHub {
    async fn publish(&self, audience: &Audience, event: &RealtimeEvent) -> Result<()> {
        let envelope = Envelope {
            audience: *audience,
            event: event.clone(),
        };
        // No subscribers is not a failure; nobody is watching.
        if self.tx.send(envelope).is_err() {
            tracing::trace!(audience = %audience, event = %event.name, "no subscribers");
        }
        Ok(())
    }
}

/// Receiving half filtered to a set of audiences.
pub struct Subscription {
    rx: broadcast::Receiver<Envelope>,
    audiences: HashSet<Audience>,
}

impl Subscription {
    /// Waits for the next event addressed to this subscription.
    ///
    /// Lagged messages are skipped with a warning.
    pub async fn recv(&mut self) -> Result<Envelope> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if self.audiences.contains(&envelope.audience) => {
                    return Ok(envelope);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(FanoutError::ChannelClosed),
            }
        }
    }

    /// Returns the next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        loop {
            match self.rx.try_recv() {
                Ok(envelope) if self.audiences.contains(&envelope.audience) => {
                    return Some(envelope);
                }
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests::{order_event, order_snapshot};
    use crate::EventName;
    use common::UserId;

    #[tokio::test]
    async fn subscription_only_sees_its_audiences() {
        let hub = BroadcastHub::default();
        let user = UserId::new();
        let mut staff = hub.subscribe([Audience::Staff]);
        let mut customer = hub.subscribe([Audience::Customer(user)]);

        let other = order_event(EventName::OrderCreated, order_snapshot(None));
        let mine = order_event(EventName::OrderUpdated, order_snapshot(Some(user)));
        hub.publish(&Audience::Staff, &other).await.unwrap();
        hub.publish(&Audience::Customer(user), &mine).await.unwrap();

        assert_eq!(staff.recv().await.unwrap().event.name, EventName::OrderCreated);
        assert_eq!(customer.recv().await.unwrap().event.name, EventName::OrderUpdated);
        assert!(staff.try_recv().is_none());
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_ok() {
        let hub = BroadcastHub::new(8);
        let event = order_event(EventName::OrderCreated, order_snapshot(None));
        assert!(hub.publish(&Audience::Staff, &event).await.is_ok());
        assert_eq!(hub.subscriber_count(), 0);
    }
}
