//! Order lifecycle engine.

use chrono::{DateTime, Utc};

use common::{
    DishId, ItemStatus, OrderId, OrderItemId, OrderPaymentStatus, OrderStatus, PaymentMethod,
    PaymentStatus, ResourceRef, ResourceStatus, TableId, UserId,
};
use fanout::EventName;
use gateway::{PaymentRequest, TxnRef};
use store::{Order, OrderItem, Payment, PaymentTarget, UnitOfWork, VoucherUsage};

use super::commands::{
    AddItem, CreateOrder, GuestAddItem, MergeOrders, OrderView, PaymentLink, RequestPayment,
    UpdateItemQuantity,
};
use super::{billing, ops};
use crate::notify::{Notification, NotificationKind};
use crate::{payment, scheduler};
use crate::{Actor, ConflictKind, DomainError, EngineContext, Outbox, Result};

/// Owns order creation, item and voucher mutation, totals and status.
#[derive(Debug, Clone)]
pub struct OrderEngine {
    ctx: EngineContext,
}

impl OrderEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Seats a walk-in party and opens a dining order.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(&self, actor: &Actor, cmd: CreateOrder) -> Result<OrderView> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let owner = if actor.is_staff() { None } else { actor.user_id() };
        let mut order = seat(uow.as_mut(), cmd.resource, owner, now, &mut outbox).await?;

        let mut added = Vec::with_capacity(cmd.items.len());
        for line in &cmd.items {
            added.push(add_line(uow.as_mut(), &order, line.dish_id, line.quantity, now).await?);
        }
        let items = ops::recalculate(uow.as_mut(), &mut order, now).await?;
        for item in &added {
            outbox.item(EventName::OrderItemCreated, &order, item);
        }

        uow.commit().await?;
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }

    /// Adds a new line. Repeat dishes get their own line.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(&self, actor: &Actor, cmd: AddItem) -> Result<OrderView> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut order = ops::load_order(uow.as_mut(), cmd.order_id).await?;
        actor.ensure_can_access(order.user_id)?;
        let item = add_line(uow.as_mut(), &order, cmd.dish_id, cmd.quantity, now).await?;
        let items = ops::recalculate(uow.as_mut(), &mut order, now).await?;
        outbox.item(EventName::OrderItemCreated, &order, &item);
        outbox.order(EventName::OrderUpdated, &order);

        uow.commit().await?;
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        actor: &Actor,
        cmd: UpdateItemQuantity,
    ) -> Result<OrderView> {
        if cmd.quantity < 0 {
            return Err(DomainError::validation(format!(
                "quantity must not be negative, got {}",
                cmd.quantity
            )));
        }
        if cmd.quantity == 0 {
            return self.delete_item(actor, cmd.item_id).await;
        }
        let quantity = u32::try_from(cmd.quantity)
            .map_err(|_| DomainError::validation("quantity is too large"))?;

        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let (mut order, mut item) = load_item(uow.as_mut(), cmd.item_id).await?;
        actor.ensure_can_access(order.user_id)?;
        ensure_accepts_items(&order)?;
        if item.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "item {} is already {}",
                item.id, item.status
            )));
        }

        item.quantity = quantity;
        item.updated_at = now;
        uow.update_order_item(&item).await?;
        let items = ops::recalculate(uow.as_mut(), &mut order, now).await?;
        outbox.item(EventName::OrderItemQuantityChanged, &order, &item);

        uow.commit().await?;
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }

    /// Removes a line the kitchen has not picked up yet.
    #[tracing::instrument(skip(self))]
    pub async fn delete_item(&self, actor: &Actor, item_id: OrderItemId) -> Result<OrderView> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let (mut order, item) = load_item(uow.as_mut(), item_id).await?;
        actor.ensure_can_access(order.user_id)?;
        if order.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "order {} is {}",
                order.id, order.status
            )));
        }
        if item.status != ItemStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "item {} is {} and can no longer be removed",
                item.id, item.status
            )));
        }

        uow.delete_order_item(item.id).await?;
        let items = ops::recalculate(uow.as_mut(), &mut order, now).await?;
        outbox.item(EventName::OrderItemDeleted, &order, &item);

        uow.commit().await?;
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }

    /// Kitchen progress on a single line.
    #[tracing::instrument(skip(self))]
    pub async fn update_item_status(
        &self,
        actor: &Actor,
        item_id: OrderItemId,
        status: ItemStatus,
    ) -> Result<OrderView> {
        actor.ensure_staff()?;
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let (mut order, mut item) = load_item(uow.as_mut(), item_id).await?;
        if order.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "order {} is {}",
                order.id, order.status
            )));
        }
        if !item.status.can_transition_to(status) {
            return Err(DomainError::invalid_state(format!(
                "item cannot move from {} to {}",
                item.status, status
            )));
        }

        item.status = status;
        item.updated_at = now;
        uow.update_order_item(&item).await?;
        let items = ops::recalculate(uow.as_mut(), &mut order, now).await?;
        outbox.item(EventName::OrderItemStatusChanged, &order, &item);
        outbox.order(EventName::OrderUpdated, &order);

        uow.commit().await?;
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }

    #[tracing::instrument(skip(self))]
    pub async fn apply_voucher(
        &self,
        actor: &Actor,
        order_id: OrderId,
        code: &str,
    ) -> Result<OrderView> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut order = ops::load_order(uow.as_mut(), order_id).await?;
        actor.ensure_can_access(order.user_id)?;
        if !order.status.can_change_voucher() {
            return Err(DomainError::invalid_state(format!(
                "order {} is {}",
                order.id, order.status
            )));
        }
        if order.voucher_id.is_some() {
            return Err(DomainError::Conflict(ConflictKind::VoucherAlreadyApplied));
        }

        let mut voucher = uow
            .get_voucher_by_code(code)
            .await?
            .ok_or_else(|| DomainError::not_found("voucher", code))?;
        let items = uow.items_for_order(order.id).await?;
        billing::ensure_voucher_usable(&voucher, billing::items_total(&items), now)?;

        voucher.current_uses += 1;
        uow.update_voucher(&voucher).await?;
        uow.insert_voucher_usage(&VoucherUsage {
            voucher_id: voucher.id,
            order_id: order.id,
            user_id: order.user_id.or(actor.user_id()),
            used_at: now,
        })
        .await?;

        order.voucher_id = Some(voucher.id);
        let items = ops::recalculate(uow.as_mut(), &mut order, now).await?;
        outbox.order(EventName::OrderUpdated, &order);

        uow.commit().await?;
        tracing::info!(
            order_id = %order.id,
            voucher = %voucher.code,
            discount = %order.voucher_discount_amount,
            "voucher applied"
        );
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_voucher(&self, actor: &Actor, order_id: OrderId) -> Result<OrderView> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut order = ops::load_order(uow.as_mut(), order_id).await?;
        actor.ensure_can_access(order.user_id)?;
        if !order.status.can_change_voucher() {
            return Err(DomainError::invalid_state(format!(
                "order {} is {}",
                order.id, order.status
            )));
        }
        if order.voucher_id.take().is_none() {
            return Err(DomainError::invalid_state("no voucher applied"));
        }

        let items = ops::recalculate(uow.as_mut(), &mut order, now).await?;
        outbox.order(EventName::OrderUpdated, &order);

        uow.commit().await?;
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }

    /// Moves every line of `source` onto `target` and cancels `source`.
    ///
    /// A source line whose dish and status match a target line is folded
    /// into it; other lines move as they are.
    #[tracing::instrument(skip(self))]
    pub async fn merge_orders(&self, actor: &Actor, cmd: MergeOrders) -> Result<OrderView> {
        actor.ensure_staff()?;
        if cmd.source == cmd.target {
            return Err(DomainError::Conflict(ConflictKind::MergeIntoSelf));
        }

        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut source = ops::load_order(uow.as_mut(), cmd.source).await?;
        let mut target = ops::load_order(uow.as_mut(), cmd.target).await?;
        for order in [&source, &target] {
            match order.status {
                OrderStatus::Paid => return Err(DomainError::Conflict(ConflictKind::MergePaidOrder)),
                OrderStatus::Cancelled => {
                    return Err(DomainError::invalid_state(format!(
                        "order {} is cancelled",
                        order.id
                    )));
                }
                _ => {}
            }
        }

        let mut target_items = uow.items_for_order(target.id).await?;
        for mut item in uow.items_for_order(source.id).await? {
            let collision = target_items
                .iter_mut()
                .find(|t| t.dish_id == item.dish_id && t.status == item.status);
            match collision {
                Some(existing) => {
                    existing.quantity += item.quantity;
                    existing.updated_at = now;
                    uow.update_order_item(existing).await?;
                    uow.delete_order_item(item.id).await?;
                }
                None => {
                    item.order_id = target.id;
                    item.updated_at = now;
                    uow.update_order_item(&item).await?;
                    target_items.push(item);
                }
            }
        }

        source.status = OrderStatus::Cancelled;
        source.waiting_kitchen_confirmation = false;
        ops::recalculate(uow.as_mut(), &mut source, now).await?;
        let items = ops::recalculate(uow.as_mut(), &mut target, now).await?;
        if source.resource != target.resource {
            scheduler::refresh_resource_status(uow.as_mut(), source.resource, now).await?;
        }
        outbox.order(EventName::OrderStatusChanged, &source);
        outbox.order(EventName::OrderUpdated, &target);

        uow.commit().await?;
        tracing::info!(source = %source.id, target = %target.id, "orders merged");
        self.ctx.flush(outbox).await;
        Ok(OrderView {
            order: target,
            items,
        })
    }

    /// Staff-driven status change.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        actor: &Actor,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderView> {
        actor.ensure_staff()?;
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut order = ops::load_order(uow.as_mut(), order_id).await?;
        if order.status == status {
            let items = uow.items_for_order(order.id).await?;
            return Ok(OrderView { order, items });
        }

        if status == OrderStatus::Paid {
            let method = order.payment_method.unwrap_or(PaymentMethod::Cash);
            ops::mark_paid(uow.as_mut(), &mut order, method, now, &mut outbox).await?;
        } else {
            if !order.status.can_transition_to(status) {
                return Err(DomainError::invalid_state(format!(
                    "order cannot move from {} to {}",
                    order.status, status
                )));
            }
            order.status = status;
            if status != OrderStatus::Dining {
                order.waiting_kitchen_confirmation = false;
            }
            order.updated_at = now;
            uow.update_order(&order).await?;
            scheduler::refresh_resource_status(uow.as_mut(), order.resource, now).await?;
            outbox.order(EventName::OrderStatusChanged, &order);
        }
        let items = uow.items_for_order(order.id).await?;

        uow.commit().await?;
        tracing::info!(order_id = %order.id, status = %order.status, "order status changed");
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }

    /// Sets the kitchen-readiness flag on a dining order.
    #[tracing::instrument(skip(self))]
    pub async fn set_kitchen_confirmation(
        &self,
        actor: &Actor,
        order_id: OrderId,
        waiting: bool,
    ) -> Result<OrderView> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut order = ops::load_order(uow.as_mut(), order_id).await?;
        actor.ensure_can_access(order.user_id)?;
        if order.status != OrderStatus::Dining {
            return Err(DomainError::invalid_state(format!(
                "kitchen confirmation needs a dining order, order {} is {}",
                order.id, order.status
            )));
        }
        order.waiting_kitchen_confirmation = waiting;
        order.updated_at = now;
        uow.update_order(&order).await?;
        let items = uow.items_for_order(order.id).await?;
        outbox.order(EventName::OrderUpdated, &order);

        uow.commit().await?;
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }

    /// Requests the bill through the payment gateway.
    #[tracing::instrument(skip(self))]
    pub async fn request_payment(&self, actor: &Actor, cmd: RequestPayment) -> Result<PaymentLink> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut order = ops::load_order(uow.as_mut(), cmd.order_id).await?;
        actor.ensure_can_access(order.user_id)?;
        ensure_payable(&order)?;
        ops::recalculate(uow.as_mut(), &mut order, now).await?;
        if !order.final_amount.is_positive() {
            return Err(DomainError::validation(format!(
                "order {} has nothing to pay",
                order.id
            )));
        }

        let completed = uow
            .payments_for(PaymentTarget::Order(order.id))
            .await?
            .into_iter()
            .any(|p| p.status == PaymentStatus::Completed);
        if completed {
            return Err(DomainError::Conflict(ConflictKind::PaymentAlreadyCompleted));
        }

        // Each attempt gets its own row; earlier rows keep whatever status
        // their callbacks gave them.
        let reference =
            payment::unused_reference(uow.as_mut(), TxnRef::order(order.id, now)).await?;
        let payment_url = self.ctx.gateway.build_payment_url(&PaymentRequest {
            reference,
            amount: order.final_amount,
            order_info: format!("Thanh toan don hang {}", order.id),
            client_ip: cmd.client_ip.clone(),
            bank_code: cmd.bank_code.clone(),
            created_at: now,
        })?;

        let transaction_ref = reference.to_string();
        uow.insert_payment(&Payment::pending(
            PaymentTarget::Order(order.id),
            order.final_amount,
            PaymentMethod::Vnpay,
            transaction_ref.clone(),
            now,
        ))
        .await?;

        enter_waiting_payment(uow.as_mut(), &mut order, PaymentMethod::Vnpay, now, &mut outbox)
            .await?;

        uow.commit().await?;
        tracing::info!(
            order_id = %order.id,
            amount = %order.final_amount,
            reference = %transaction_ref,
            "payment requested"
        );
        self.ctx.flush(outbox).await;
        Ok(PaymentLink {
            transaction_ref,
            payment_url,
        })
    }

    /// Records a cash bill awaiting staff confirmation.
    #[tracing::instrument(skip(self))]
    pub async fn request_cash_payment(&self, actor: &Actor, order_id: OrderId) -> Result<OrderView> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut order = ops::load_order(uow.as_mut(), order_id).await?;
        actor.ensure_can_access(order.user_id)?;
        ensure_payable(&order)?;
        let items = ops::recalculate(uow.as_mut(), &mut order, now).await?;

        match pending_cash_payment(uow.as_mut(), order.id).await? {
            Some(mut existing) => {
                existing.amount = order.final_amount;
                existing.updated_at = now;
                uow.update_payment(&existing).await?;
            }
            None => {
                uow.insert_payment(&Payment::pending(
                    PaymentTarget::Order(order.id),
                    order.final_amount,
                    PaymentMethod::Cash,
                    cash_reference(order.id, now),
                    now,
                ))
                .await?;
            }
        }
        enter_waiting_payment(uow.as_mut(), &mut order, PaymentMethod::Cash, now, &mut outbox)
            .await?;

        uow.commit().await?;
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }

    /// Staff confirm the cash was received.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_cash_payment(&self, actor: &Actor, order_id: OrderId) -> Result<OrderView> {
        actor.ensure_staff()?;
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut order = ops::load_order(uow.as_mut(), order_id).await?;
        let payment = pending_cash_payment(uow.as_mut(), order.id)
            .await?
            .ok_or_else(|| DomainError::invalid_state("no cash payment awaiting confirmation"))?;

        uow.settle_payment(&payment.transaction_ref, PaymentStatus::Completed, None, now)
            .await?;
        ops::mark_paid(uow.as_mut(), &mut order, PaymentMethod::Cash, now, &mut outbox).await?;
        let items = uow.items_for_order(order.id).await?;

        uow.commit().await?;
        tracing::info!(order_id = %order.id, amount = %payment.amount, "cash payment confirmed");
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }

    pub async fn get_order(&self, actor: &Actor, order_id: OrderId) -> Result<OrderView> {
        let mut uow = self.ctx.begin().await?;
        let order = ops::load_order(uow.as_mut(), order_id).await?;
        actor.ensure_can_access(order.user_id)?;
        let items = uow.items_for_order(order.id).await?;
        Ok(OrderView { order, items })
    }

    /// The order a walk-in guest at `table_id` is eating from, if any.
    pub async fn active_order_for_table(&self, table_id: TableId) -> Result<Option<OrderView>> {
        let mut uow = self.ctx.begin().await?;
        match walk_in_order(uow.as_mut(), ResourceRef::Table(table_id)).await? {
            Some(order) => {
                let items = uow.items_for_order(order.id).await?;
                Ok(Some(OrderView { order, items }))
            }
            None => Ok(None),
        }
    }

    /// Adds a dish for a guest at a table, seating them first if needed.
    #[tracing::instrument(skip(self))]
    pub async fn guest_add_item(&self, actor: &Actor, cmd: GuestAddItem) -> Result<OrderView> {
        let now = self.ctx.now();
        let resource = ResourceRef::Table(cmd.table_id);
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        scheduler::lock_resources(uow.as_mut(), &[resource]).await?;
        let mut order = match walk_in_order(uow.as_mut(), resource).await? {
            Some(order) => order,
            None => {
                let owner = if actor.is_staff() { None } else { actor.user_id() };
                seat(uow.as_mut(), resource, owner, now, &mut outbox).await?
            }
        };
        actor.ensure_can_access(order.user_id)?;

        let item = add_line(uow.as_mut(), &order, cmd.dish_id, cmd.quantity, now).await?;
        let items = ops::recalculate(uow.as_mut(), &mut order, now).await?;
        outbox.item(EventName::OrderItemCreated, &order, &item);

        uow.commit().await?;
        self.ctx.flush(outbox).await;
        Ok(OrderView { order, items })
    }
}

/// Opens a dining order on a free resource.
async fn seat(
    uow: &mut dyn UnitOfWork,
    resource: ResourceRef,
    owner: Option<UserId>,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<Order> {
    scheduler::lock_resources(uow, &[resource]).await?;
    scheduler::load_resource(uow, resource).await?;
    scheduler::check_overlap(uow, resource, scheduler::walk_in_window(now), None, now).await?;

    let order = ops::new_order(resource, owner, OrderStatus::Dining, now);
    uow.insert_order(&order).await?;
    uow.set_resource_status(resource, ResourceStatus::Occupied)
        .await?;

    metrics::counter!("orders_created_total", "source" => "walk_in").increment(1);
    tracing::info!(order_id = %order.id, resource = %resource, "walk-in seated");
    outbox.order(EventName::OrderCreated, &order);
    outbox.notify(Notification::order(
        NotificationKind::OrderCreated,
        order.user_id,
        order.id,
    ));
    Ok(order)
}

async fn add_line(
    uow: &mut dyn UnitOfWork,
    order: &Order,
    dish_id: DishId,
    quantity: u32,
    now: DateTime<Utc>,
) -> Result<OrderItem> {
    if quantity == 0 {
        return Err(DomainError::validation("quantity must be at least 1"));
    }
    ensure_accepts_items(order)?;

    let dish = uow
        .get_dish(dish_id)
        .await?
        .ok_or_else(|| DomainError::not_found("dish", dish_id))?;
    if !dish.active {
        return Err(DomainError::invalid_state(format!(
            "dish {} is unavailable",
            dish.name
        )));
    }

    let item = ops::new_item(order.id, dish.id, quantity, dish.price, now);
    uow.insert_order_item(&item).await?;
    Ok(item)
}

async fn load_item(uow: &mut dyn UnitOfWork, item_id: OrderItemId) -> Result<(Order, OrderItem)> {
    let item = uow
        .get_order_item(item_id)
        .await?
        .ok_or_else(|| DomainError::not_found("order item", item_id))?;
    let order = ops::load_order(uow, item.order_id).await?;
    Ok((order, item))
}

fn ensure_accepts_items(order: &Order) -> Result<()> {
    if order.status.accepts_items() {
        Ok(())
    } else {
        Err(DomainError::invalid_state(format!(
            "order {} is {} and not modifiable",
            order.id, order.status
        )))
    }
}

fn ensure_payable(order: &Order) -> Result<()> {
    if order.status.can_request_payment() || order.status == OrderStatus::WaitingPayment {
        Ok(())
    } else {
        Err(DomainError::invalid_state(format!(
            "order {} is {} and cannot be billed",
            order.id, order.status
        )))
    }
}

async fn enter_waiting_payment(
    uow: &mut dyn UnitOfWork,
    order: &mut Order,
    method: PaymentMethod,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<()> {
    let status_changed = order.status != OrderStatus::WaitingPayment;
    order.status = OrderStatus::WaitingPayment;
    order.payment_status = OrderPaymentStatus::Pending;
    order.payment_method = Some(method);
    order.waiting_kitchen_confirmation = false;
    order.updated_at = now;
    uow.update_order(order).await?;

    outbox.order(EventName::OrderPaymentRequested, order);
    if status_changed {
        outbox.order(EventName::OrderStatusChanged, order);
    }
    outbox.notify(Notification::order(
        NotificationKind::OrderPaymentRequested,
        order.user_id,
        order.id,
    ));
    Ok(())
}

async fn pending_cash_payment(
    uow: &mut dyn UnitOfWork,
    order_id: OrderId,
) -> Result<Option<Payment>> {
    Ok(uow
        .payments_for(PaymentTarget::Order(order_id))
        .await?
        .into_iter()
        .find(|p| p.method == PaymentMethod::Cash && p.status == PaymentStatus::Pending))
}

fn cash_reference(order_id: OrderId, now: DateTime<Utc>) -> String {
    format!("CASH_{order_id}_{}", now.timestamp_millis())
}

/// Active order at a resource that guests are actually seated at.
async fn walk_in_order(uow: &mut dyn UnitOfWork, resource: ResourceRef) -> Result<Option<Order>> {
    Ok(uow
        .active_orders_for_resource(resource)
        .await?
        .into_iter()
        .find(|o| !(o.status == OrderStatus::Pending && o.reservation_id.is_some())))
}
