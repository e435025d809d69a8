use std::sync::Arc;

use chrono::{DateTime, Utc};
use fanout::{EventName, FanOut, Payload, RealtimeEvent};
use gateway::PaymentGateway;
use store::{Order, OrderItem, Reservation, Store, UnitOfWork};

use crate::notify::{NoopNotifier, Notification, Notifier};
use crate::{Clock, Result, SystemClock, snapshot};

/// Collaborators shared by every engine.
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub fanout: FanOut,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl EngineContext {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            store,
            gateway,
            fanout: FanOut::disabled(),
            notifier: Arc::new(NoopNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_fanout(mut self, fanout: FanOut) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(self.store.begin().await?)
    }

    /// Delivers everything collected while the unit of work was open.
    ///
    /// Call only after a successful commit.
    pub(crate) async fn flush(&self, outbox: Outbox) {
        let emitted_at = self.now();
        for (name, payload) in outbox.events {
            self.fanout
                .emit(RealtimeEvent::new(name, payload, emitted_at))
                .await;
        }
        for notification in &outbox.notifications {
            self.notifier.notify(notification).await;
        }
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext").finish_non_exhaustive()
    }
}

/// Side effects staged inside a unit of work and released after commit.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<(EventName, Payload)>,
    notifications: Vec<Notification>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(&mut self, name: EventName, order: &Order) {
        self.events.push((
            name,
            Payload::Order {
                order: snapshot::order(order),
            },
        ));
    }

    pub fn item(&mut self, name: EventName, order: &Order, item: &OrderItem) {
        self.events.push((
            name,
            Payload::OrderItem {
                order: snapshot::order(order),
                item: snapshot::item(item),
            },
        ));
    }

    pub fn reservation(&mut self, name: EventName, reservation: &Reservation, order: Option<&Order>) {
        self.events.push((
            name,
            Payload::Reservation {
                reservation: snapshot::reservation(reservation),
                order: order.map(snapshot::order),
            },
        ));
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.notifications.is_empty()
    }
}
