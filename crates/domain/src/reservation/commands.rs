//! Reservation commands and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{Money, ReservationId, ResourceRef, UserId};
use store::{Order, Reservation};

use crate::order::{ItemLine, PaymentLink};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservation {
    /// Booking customer. Only staff may set this; customers book for
    /// themselves.
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub resource: ResourceRef,
    pub reservation_time: DateTime<Utc>,
    /// Defaults to 90 minutes.
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    pub num_people: u32,
    #[serde(default)]
    pub pre_order_items: Vec<ItemLine>,
    #[serde(default)]
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub event_fee: Money,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub client_ip: String,
    #[serde(default)]
    pub bank_code: Option<String>,
}

impl CreateReservation {
    pub fn new(
        resource: impl Into<ResourceRef>,
        reservation_time: DateTime<Utc>,
        num_people: u32,
    ) -> Self {
        Self {
            user_id: None,
            resource: resource.into(),
            reservation_time,
            duration_minutes: None,
            num_people,
            pre_order_items: Vec::new(),
            event_id: None,
            event_fee: Money::zero(),
            notes: None,
            client_ip: String::new(),
            bank_code: None,
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_pre_order(mut self, line: ItemLine) -> Self {
        self.pre_order_items.push(line);
        self
    }

    pub fn with_event(mut self, event_id: Uuid, fee: Money) -> Self {
        self.event_id = Some(event_id);
        self.event_fee = fee;
        self
    }

    pub fn with_duration(mut self, minutes: i64) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }
}

/// Fields left `None` keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReservation {
    #[serde(default)]
    pub resource: Option<ResourceRef>,
    #[serde(default)]
    pub reservation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub num_people: Option<u32>,
    /// Replaces the whole pre-order when present.
    #[serde(default)]
    pub pre_order_items: Option<Vec<ItemLine>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Outcome of a reservation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationCreated {
    pub reservation: Reservation,
    /// Present when the reservation was confirmed straight away.
    pub order: Option<Order>,
    pub requires_payment: bool,
    pub payment: Option<PaymentLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationView {
    pub reservation: Reservation,
    pub order: Option<Order>,
}

impl ReservationView {
    pub fn id(&self) -> ReservationId {
        self.reservation.id
    }
}
