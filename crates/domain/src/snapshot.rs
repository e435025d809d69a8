//! Conversions from persisted records to fan-out payloads.

use fanout::{ItemSnapshot, OrderSnapshot, ReservationSnapshot};
use store::{Order, OrderItem, Reservation};

pub fn order(order: &Order) -> OrderSnapshot {
    OrderSnapshot {
        order_id: order.id,
        user_id: order.user_id,
        resource: order.resource,
        reservation_id: order.reservation_id,
        status: order.status,
        payment_status: order.payment_status,
        waiting_kitchen_confirmation: order.waiting_kitchen_confirmation,
        total_amount: order.total_amount,
        voucher_discount_amount: order.voucher_discount_amount,
        event_fee: order.event_fee,
        deposit_amount: order.deposit_amount,
        final_amount: order.final_amount,
    }
}

pub fn item(item: &OrderItem) -> ItemSnapshot {
    ItemSnapshot {
        item_id: item.id,
        dish_id: item.dish_id,
        quantity: item.quantity,
        price: item.price,
        status: item.status,
    }
}

pub fn reservation(reservation: &Reservation) -> ReservationSnapshot {
    ReservationSnapshot {
        reservation_id: reservation.id,
        user_id: reservation.user_id,
        resource: reservation.resource,
        status: reservation.status,
        reservation_time: reservation.reservation_time,
        duration_minutes: reservation.duration_minutes,
        num_people: reservation.num_people,
        deposit_amount: reservation.deposit_amount,
        event_fee: reservation.event_fee,
    }
}
