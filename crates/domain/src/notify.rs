//! Notification collaborator.
//!
//! Called after each committed transition. Delivery (push, email, in-app)
//! belongs to the implementation; engines never wait on its outcome.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use common::{OrderId, ReservationId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderCreated,
    OrderPaymentRequested,
    OrderPaid,
    ReservationCreated,
    ReservationConfirmed,
    ReservationCancelled,
    ReservationCheckedIn,
    DepositFailed,
}

/// What happened to what, and who should hear about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// The customer concerned. Staff are always notified.
    pub recipient: Option<UserId>,
    pub order_id: Option<OrderId>,
    pub reservation_id: Option<ReservationId>,
}

impl Notification {
    pub fn order(kind: NotificationKind, recipient: Option<UserId>, order_id: OrderId) -> Self {
        Self {
            kind,
            recipient,
            order_id: Some(order_id),
            reservation_id: None,
        }
    }

    pub fn reservation(
        kind: NotificationKind,
        recipient: Option<UserId>,
        reservation_id: ReservationId,
    ) -> Self {
        Self {
            kind,
            recipient,
            order_id: None,
            reservation_id: Some(reservation_id),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Fire and forget. Implementations log their own failures.
    async fn notify(&self, notification: &Notification);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &Notification) {}
}

/// Notifier that logs each notification through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) {
        tracing::info!(
            kind = ?notification.kind,
            recipient = ?notification.recipient,
            order_id = ?notification.order_id,
            reservation_id = ?notification.reservation_id,
            "notification"
        );
    }
}

/// Keeps notifications in memory for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    pub async fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().await.iter().map(|n| n.kind).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) {
        self.sent.lock().await.push(notification.clone());
    }
}
