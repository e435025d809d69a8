//! Order mutations shared by the engines and the payment reconciler.
//!
//! Everything here runs inside the caller's unit of work and stages its
//! events in the caller's outbox.

use chrono::{DateTime, Utc};

use common::{
    ItemStatus, Money, OrderId, OrderItemId, OrderPaymentStatus, OrderStatus, PaymentMethod,
    Ranking, ResourceRef, UserId,
};
use fanout::EventName;
use store::{Order, OrderItem, Reservation, UnitOfWork};

use super::billing;
use crate::notify::{Notification, NotificationKind};
use crate::{DomainError, Outbox, Result, scheduler};

pub(crate) fn new_order(
    resource: ResourceRef,
    user_id: Option<UserId>,
    status: OrderStatus,
    now: DateTime<Utc>,
) -> Order {
    Order {
        id: OrderId::new(),
        user_id,
        resource,
        reservation_id: None,
        voucher_id: None,
        status,
        payment_status: OrderPaymentStatus::Pending,
        payment_method: None,
        waiting_kitchen_confirmation: false,
        total_amount: Money::zero(),
        voucher_discount_amount: Money::zero(),
        event_fee: Money::zero(),
        deposit_amount: Money::zero(),
        final_amount: Money::zero(),
        loyalty_credited: false,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn new_item(
    order_id: OrderId,
    dish_id: common::DishId,
    quantity: u32,
    price: Money,
    now: DateTime<Utc>,
) -> OrderItem {
    OrderItem {
        id: OrderItemId::new(),
        order_id,
        dish_id,
        quantity,
        price,
        status: ItemStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) async fn load_order(uow: &mut dyn UnitOfWork, id: OrderId) -> Result<Order> {
    uow.get_order(id)
        .await?
        .ok_or_else(|| DomainError::not_found("order", id))
}

/// Re-reads items and voucher, rewrites totals and persists the order.
pub(crate) async fn recalculate(
    uow: &mut dyn UnitOfWork,
    order: &mut Order,
    now: DateTime<Utc>,
) -> Result<Vec<OrderItem>> {
    let items = uow.items_for_order(order.id).await?;
    let voucher = match order.voucher_id {
        Some(id) => uow.get_voucher(id).await?,
        None => None,
    };
    billing::apply_totals(order, &items, voucher.as_ref());
    order.updated_at = now;
    uow.update_order(order).await?;
    Ok(items)
}

/// Credits loyalty points for a paid order exactly once.
async fn credit_loyalty(uow: &mut dyn UnitOfWork, order: &mut Order) -> Result<()> {
    if order.loyalty_credited {
        return Ok(());
    }
    order.loyalty_credited = true;

    let Some(user_id) = order.user_id else {
        return Ok(());
    };
    let Some(mut user) = uow.get_user(user_id).await? else {
        tracing::warn!(order_id = %order.id, user_id = %user_id, "paid order owner missing");
        return Ok(());
    };

    let earned = billing::loyalty_points(order.final_amount);
    user.points += earned;
    user.ranking = user.ranking.max(Ranking::for_points(user.points));
    uow.update_user(&user).await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user_id,
        earned,
        ranking = %user.ranking,
        "loyalty points credited"
    );
    Ok(())
}

/// Moves an order to paid and applies the paid side effects.
pub(crate) async fn mark_paid(
    uow: &mut dyn UnitOfWork,
    order: &mut Order,
    method: PaymentMethod,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<()> {
    if order.status == OrderStatus::Paid {
        return Ok(());
    }
    if !order.status.can_transition_to(OrderStatus::Paid) {
        return Err(DomainError::invalid_state(format!(
            "order {} cannot be paid while {}",
            order.id, order.status
        )));
    }

    order.status = OrderStatus::Paid;
    order.payment_status = OrderPaymentStatus::Paid;
    order.payment_method = Some(method);
    order.waiting_kitchen_confirmation = false;
    order.updated_at = now;
    credit_loyalty(uow, order).await?;
    uow.update_order(order).await?;
    scheduler::refresh_resource_status(uow, order.resource, now).await?;

    outbox.order(EventName::OrderPaymentCompleted, order);
    outbox.order(EventName::OrderStatusChanged, order);
    outbox.notify(Notification::order(
        NotificationKind::OrderPaid,
        order.user_id,
        order.id,
    ));
    Ok(())
}

/// Returns the order belonging to a confirmed reservation, creating it
/// from the pre-order lines if it does not exist yet.
pub(crate) async fn materialize_reservation_order(
    uow: &mut dyn UnitOfWork,
    reservation: &Reservation,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<Order> {
    if let Some(existing) = uow.order_for_reservation(reservation.id).await? {
        return Ok(existing);
    }

    let mut order = new_order(
        reservation.resource,
        reservation.user_id,
        OrderStatus::Pending,
        now,
    );
    order.reservation_id = Some(reservation.id);
    order.event_fee = reservation.event_fee;
    order.deposit_amount = reservation.deposit_amount;
    uow.insert_order(&order).await?;

    for line in &reservation.pre_order_items {
        let item = new_item(order.id, line.dish_id, line.quantity, line.price, now);
        uow.insert_order_item(&item).await?;
    }
    recalculate(uow, &mut order, now).await?;

    metrics::counter!("orders_created_total", "source" => "reservation").increment(1);
    tracing::info!(
        order_id = %order.id,
        reservation_id = %reservation.id,
        items = reservation.pre_order_items.len(),
        "order created for reservation"
    );
    outbox.order(EventName::OrderCreated, &order);
    Ok(order)
}

/// Rewrites a pending reservation order's items from the pre-order lines.
pub(crate) async fn replace_pre_order_items(
    uow: &mut dyn UnitOfWork,
    reservation: &Reservation,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<()> {
    let Some(mut order) = uow.order_for_reservation(reservation.id).await? else {
        return Ok(());
    };
    if order.status != OrderStatus::Pending {
        return Err(DomainError::invalid_state(
            "pre-order cannot change after check-in",
        ));
    }

    for item in uow.items_for_order(order.id).await? {
        uow.delete_order_item(item.id).await?;
    }
    for line in &reservation.pre_order_items {
        let item = new_item(order.id, line.dish_id, line.quantity, line.price, now);
        uow.insert_order_item(&item).await?;
    }
    order.event_fee = reservation.event_fee;
    recalculate(uow, &mut order, now).await?;
    outbox.order(EventName::OrderUpdated, &order);
    Ok(())
}

/// Cancels the order created for a reservation if the guests never arrived.
pub(crate) async fn cancel_reservation_order(
    uow: &mut dyn UnitOfWork,
    reservation: &Reservation,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<Option<Order>> {
    let Some(mut order) = uow.order_for_reservation(reservation.id).await? else {
        return Ok(None);
    };
    if order.status != OrderStatus::Pending {
        return Ok(Some(order));
    }
    order.status = OrderStatus::Cancelled;
    order.updated_at = now;
    uow.update_order(&order).await?;
    outbox.order(EventName::OrderStatusChanged, &order);
    Ok(Some(order))
}
