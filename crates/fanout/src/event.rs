//! Event names and payload shapes.
//!
//! Payloads always carry the entity id and its current monetary totals so
//! observers can render without a follow-up fetch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{
    DishId, ItemStatus, Money, OrderId, OrderItemId, OrderPaymentStatus, OrderStatus,
    ReservationId, ReservationStatus, ResourceRef, UserId,
};

use crate::Audience;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    OrderCreated,
    OrderUpdated,
    OrderStatusChanged,
    OrderItemCreated,
    OrderItemQuantityChanged,
    OrderItemStatusChanged,
    OrderItemDeleted,
    OrderPaymentRequested,
    OrderPaymentCompleted,
    ReservationCreated,
    ReservationUpdated,
    ReservationStatusChanged,
    ReservationCheckedIn,
    ReservationDepositRequested,
    ReservationDepositCompleted,
    ReservationDepositFailed,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::OrderCreated => "order_created",
            EventName::OrderUpdated => "order_updated",
            EventName::OrderStatusChanged => "order_status_changed",
            EventName::OrderItemCreated => "order_item_created",
            EventName::OrderItemQuantityChanged => "order_item_quantity_changed",
            EventName::OrderItemStatusChanged => "order_item_status_changed",
            EventName::OrderItemDeleted => "order_item_deleted",
            EventName::OrderPaymentRequested => "order_payment_requested",
            EventName::OrderPaymentCompleted => "order_payment_completed",
            EventName::ReservationCreated => "reservation_created",
            EventName::ReservationUpdated => "reservation_updated",
            EventName::ReservationStatusChanged => "reservation_status_changed",
            EventName::ReservationCheckedIn => "reservation_checked_in",
            EventName::ReservationDepositRequested => "reservation_deposit_requested",
            EventName::ReservationDepositCompleted => "reservation_deposit_completed",
            EventName::ReservationDepositFailed => "reservation_deposit_failed",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub user_id: Option<UserId>,
    pub resource: ResourceRef,
    pub reservation_id: Option<ReservationId>,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub waiting_kitchen_confirmation: bool,
    pub total_amount: Money,
    pub voucher_discount_amount: Money,
    pub event_fee: Money,
    pub deposit_amount: Money,
    pub final_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub item_id: OrderItemId,
    pub dish_id: DishId,
    pub quantity: u32,
    pub price: Money,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSnapshot {
    pub reservation_id: ReservationId,
    pub user_id: Option<UserId>,
    pub resource: ResourceRef,
    pub status: ReservationStatus,
    pub reservation_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub num_people: u32,
    pub deposit_amount: Money,
    pub event_fee: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Order {
        order: OrderSnapshot,
    },
    OrderItem {
        order: OrderSnapshot,
        item: ItemSnapshot,
    },
    Reservation {
        reservation: ReservationSnapshot,
        order: Option<OrderSnapshot>,
    },
}

/// A committed state change ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub name: EventName,
    pub payload: Payload,
    pub emitted_at: DateTime<Utc>,
}

impl RealtimeEvent {
    pub fn new(name: EventName, payload: Payload, emitted_at: DateTime<Utc>) -> Self {
        Self {
            name,
            payload,
            emitted_at,
        }
    }

    /// Everyone who should see this event.
    ///
    /// Staff always; the owning customer when there is one; the entity's
    /// own room; the resource's guest room only for walk-ins.
    pub fn audiences(&self) -> Vec<Audience> {
        let (owner, entity_room, resource) = match &self.payload {
            Payload::Order { order } | Payload::OrderItem { order, .. } => {
                (order.user_id, Audience::OrderRoom(order.order_id), order.resource)
            }
            Payload::Reservation { reservation, .. } => (
                reservation.user_id,
                Audience::ReservationRoom(reservation.reservation_id),
                reservation.resource,
            ),
        };

        let mut audiences = vec![Audience::Staff];
        match owner {
            Some(user_id) => audiences.push(Audience::Customer(user_id)),
            None => audiences.push(Audience::for_resource(resource)),
        }
        audiences.push(entity_room);
        audiences
    }

    /// Id of the entity the event is about, as a string.
    pub fn entity_id(&self) -> String {
        match &self.payload {
            Payload::Order { order } => order.order_id.to_string(),
            Payload::OrderItem { item, .. } => item.item_id.to_string(),
            Payload::Reservation { reservation, .. } => reservation.reservation_id.to_string(),
        }
    }
}
