//! Reservation lifecycle engine.

use chrono::{DateTime, Duration, Utc};

use common::{
    Money, OrderStatus, PaymentMethod, PaymentStatus, ReservationId, ReservationStatus,
    ResourceRef, ResourceStatus,
};
use fanout::EventName;
use gateway::{PaymentGateway, PaymentRequest, TxnRef};
use store::{Order, Payment, PaymentTarget, PreOrderItem, Reservation, UnitOfWork};

use super::commands::{CreateReservation, ReservationCreated, ReservationView, UpdateReservation};
use super::deposit::{self, DepositPath};
use crate::notify::{Notification, NotificationKind};
use crate::payment;
use crate::order::{ItemLine, PaymentLink, ops};
use crate::scheduler::{self, DEFAULT_DURATION_MINUTES, Exclude, TimeWindow};
use crate::{Actor, ConflictKind, DomainError, EngineContext, Outbox, Result};

/// Owns reservation creation, modification, confirmation and check-in.
#[derive(Debug, Clone)]
pub struct ReservationEngine {
    ctx: EngineContext,
}

impl ReservationEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_reservation(
        &self,
        actor: &Actor,
        cmd: CreateReservation,
    ) -> Result<ReservationCreated> {
        let user_id = match actor {
            Actor::Guest => return Err(DomainError::Unauthorized),
            _ if actor.is_staff() => cmd.user_id,
            _ => actor.user_id(),
        };
        let now = self.ctx.now();
        if cmd.num_people == 0 {
            return Err(DomainError::validation("party size must be at least 1"));
        }
        if cmd.event_fee.amount() < 0 {
            return Err(DomainError::validation("event fee must not be negative"));
        }
        if cmd.reservation_time <= now {
            return Err(DomainError::validation("reservation time must be in the future"));
        }
        let window = TimeWindow::from_duration(
            cmd.reservation_time,
            cmd.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
        )?;

        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        scheduler::lock_resources(uow.as_mut(), &[cmd.resource]).await?;
        let info = scheduler::load_resource(uow.as_mut(), cmd.resource).await?;
        ensure_capacity(cmd.num_people, info.capacity)?;

        let user = match user_id {
            Some(id) => Some(
                uow.get_user(id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("user", id))?,
            ),
            None => None,
        };
        if user.as_ref().is_some_and(|u| u.is_banned()) {
            return Err(DomainError::forbidden("account is banned from reserving"));
        }

        scheduler::check_overlap(uow.as_mut(), cmd.resource, window, None, now).await?;

        let pre_order = resolve_pre_order(uow.as_mut(), &cmd.pre_order_items).await?;
        let required = deposit::required_deposit(
            cmd.event_fee,
            deposit::pre_order_subtotal(&pre_order),
            info.deposit,
        );
        let path = deposit::choose_path(
            user.as_ref().map(|u| u.ranking),
            !pre_order.is_empty(),
            required,
        );

        let mut reservation = Reservation {
            id: ReservationId::new(),
            user_id,
            resource: cmd.resource,
            reservation_time: window.start(),
            duration_minutes: (window.end() - window.start()).num_minutes(),
            num_people: cmd.num_people,
            status: ReservationStatus::Pending,
            deposit_amount: required,
            pre_order_items: pre_order,
            event_id: cmd.event_id,
            event_fee: cmd.event_fee,
            notes: cmd.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        let (order, payment) = match path {
            DepositPath::PaymentRequired(_) => {
                uow.insert_reservation(&reservation).await?;
                let link = issue_deposit_link(
                    uow.as_mut(),
                    self.ctx.gateway.as_ref(),
                    &reservation,
                    &cmd.client_ip,
                    cmd.bank_code.clone(),
                    now,
                )
                .await?;
                outbox.reservation(EventName::ReservationDepositRequested, &reservation, None);
                (None, Some(link))
            }
            DepositPath::VipFastPath | DepositPath::NoDeposit => {
                if path == DepositPath::VipFastPath {
                    reservation.deposit_amount = Money::zero();
                }
                reservation.status = ReservationStatus::Confirmed;
                uow.insert_reservation(&reservation).await?;
                let order =
                    ops::materialize_reservation_order(uow.as_mut(), &reservation, now, &mut outbox)
                        .await?;
                outbox.notify(Notification::reservation(
                    NotificationKind::ReservationConfirmed,
                    reservation.user_id,
                    reservation.id,
                ));
                (Some(order), None)
            }
        };
        scheduler::refresh_resource_status(uow.as_mut(), reservation.resource, now).await?;

        outbox.reservation(EventName::ReservationCreated, &reservation, order.as_ref());
        outbox.notify(Notification::reservation(
            NotificationKind::ReservationCreated,
            reservation.user_id,
            reservation.id,
        ));

        uow.commit().await?;
        let path_label = match path {
            DepositPath::VipFastPath => "vip",
            DepositPath::PaymentRequired(_) => "deposit",
            DepositPath::NoDeposit => "no_deposit",
        };
        metrics::counter!("reservations_created_total", "path" => path_label).increment(1);
        tracing::info!(
            reservation_id = %reservation.id,
            resource = %reservation.resource,
            deposit = %reservation.deposit_amount,
            path = path_label,
            "reservation created"
        );
        self.ctx.flush(outbox).await;

        Ok(ReservationCreated {
            requires_payment: payment.is_some(),
            reservation,
            order,
            payment,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_reservation(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
        cmd: UpdateReservation,
    ) -> Result<ReservationView> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut reservation = load_reservation(uow.as_mut(), reservation_id).await?;
        actor.ensure_can_access(reservation.user_id)?;
        if reservation.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "reservation {} is {}",
                reservation.id, reservation.status
            )));
        }
        let current = scheduler::load_resource(uow.as_mut(), reservation.resource).await?;
        ensure_modifiable(actor, &reservation, current.cancel_minutes, now)?;
        if uow
            .order_for_reservation(reservation.id)
            .await?
            .is_some_and(|o| o.status != OrderStatus::Pending)
        {
            return Err(DomainError::invalid_state(format!(
                "reservation {} is already checked in",
                reservation.id
            )));
        }

        let old_resource = reservation.resource;
        let resource = cmd.resource.unwrap_or(old_resource);
        let start = cmd.reservation_time.unwrap_or(reservation.reservation_time);
        let duration = cmd.duration_minutes.unwrap_or(reservation.duration_minutes);
        let num_people = cmd.num_people.unwrap_or(reservation.num_people);
        if num_people == 0 {
            return Err(DomainError::validation("party size must be at least 1"));
        }

        let info = if resource == old_resource {
            current
        } else {
            scheduler::load_resource(uow.as_mut(), resource).await?
        };
        scheduler::lock_resources(uow.as_mut(), &[old_resource, resource]).await?;
        ensure_capacity(num_people, info.capacity)?;

        let moved = resource != old_resource
            || start != reservation.reservation_time
            || duration != reservation.duration_minutes;
        if moved {
            if start <= now {
                return Err(DomainError::validation("reservation time must be in the future"));
            }
            let window = TimeWindow::from_duration(start, duration)?;
            scheduler::check_overlap(
                uow.as_mut(),
                resource,
                window,
                Some(Exclude::Reservation(reservation.id)),
                now,
            )
            .await?;
        }

        reservation.resource = resource;
        reservation.reservation_time = start;
        reservation.duration_minutes = duration;
        reservation.num_people = num_people;
        if let Some(notes) = cmd.notes {
            reservation.notes = Some(notes);
        }
        let pre_order_changed = match &cmd.pre_order_items {
            Some(lines) => {
                reservation.pre_order_items = resolve_pre_order(uow.as_mut(), lines).await?;
                true
            }
            None => false,
        };
        if reservation.status == ReservationStatus::Pending {
            reservation.deposit_amount = deposit::required_deposit(
                reservation.event_fee,
                deposit::pre_order_subtotal(&reservation.pre_order_items),
                info.deposit,
            );
        }
        reservation.updated_at = now;
        uow.update_reservation(&reservation).await?;

        let mut order = uow.order_for_reservation(reservation.id).await?;
        if let Some(linked) = order.as_mut() {
            if linked.resource != resource && linked.status == OrderStatus::Pending {
                linked.resource = resource;
                linked.updated_at = now;
                uow.update_order(linked).await?;
            }
        }
        if pre_order_changed {
            ops::replace_pre_order_items(uow.as_mut(), &reservation, now, &mut outbox).await?;
            order = uow.order_for_reservation(reservation.id).await?;
        }
        scheduler::refresh_resource_status(uow.as_mut(), resource, now).await?;
        if resource != old_resource {
            scheduler::refresh_resource_status(uow.as_mut(), old_resource, now).await?;
        }
        outbox.reservation(EventName::ReservationUpdated, &reservation, order.as_ref());

        uow.commit().await?;
        tracing::info!(reservation_id = %reservation.id, moved, "reservation updated");
        self.ctx.flush(outbox).await;
        Ok(ReservationView { reservation, order })
    }

    /// Staff-driven status change.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
        status: ReservationStatus,
    ) -> Result<ReservationView> {
        actor.ensure_staff()?;
        self.transition(reservation_id, status).await
    }

    pub async fn confirm(&self, actor: &Actor, reservation_id: ReservationId) -> Result<ReservationView> {
        self.update_status(actor, reservation_id, ReservationStatus::Confirmed)
            .await
    }

    /// Cancels on behalf of the owner or staff.
    ///
    /// Customers cannot cancel inside the resource's cancellation window.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, actor: &Actor, reservation_id: ReservationId) -> Result<ReservationView> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut reservation = load_reservation(uow.as_mut(), reservation_id).await?;
        actor.ensure_can_access(reservation.user_id)?;
        let info = scheduler::load_resource(uow.as_mut(), reservation.resource).await?;
        ensure_modifiable(actor, &reservation, info.cancel_minutes, now)?;
        let order = apply_status(
            uow.as_mut(),
            &mut reservation,
            ReservationStatus::Cancelled,
            now,
            &mut outbox,
        )
        .await?;

        uow.commit().await?;
        let by = if actor.is_staff() { "staff" } else { "customer" };
        metrics::counter!("reservations_cancelled_total", "by" => by).increment(1);
        tracing::info!(reservation_id = %reservation.id, "reservation cancelled");
        self.ctx.flush(outbox).await;
        Ok(ReservationView { reservation, order })
    }

    /// Seats a confirmed party at their reservation's order.
    #[tracing::instrument(skip(self))]
    pub async fn check_in(&self, actor: &Actor, reservation_id: ReservationId) -> Result<ReservationView> {
        actor.ensure_staff()?;
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let reservation = load_reservation(uow.as_mut(), reservation_id).await?;
        if reservation.status != ReservationStatus::Confirmed {
            return Err(DomainError::invalid_state(format!(
                "reservation {} is {}, only confirmed reservations can check in",
                reservation.id, reservation.status
            )));
        }
        let mut order = uow.order_for_reservation(reservation.id).await?.ok_or_else(|| {
            DomainError::not_found("order for reservation", reservation.id)
        })?;
        if order.status != OrderStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "reservation {} is already checked in",
                reservation.id
            )));
        }

        scheduler::lock_resources(uow.as_mut(), &[reservation.resource]).await?;
        order.status = OrderStatus::Dining;
        order.updated_at = now;
        uow.update_order(&order).await?;
        uow.set_resource_status(reservation.resource, ResourceStatus::Occupied)
            .await?;

        outbox.reservation(EventName::ReservationCheckedIn, &reservation, Some(&order));
        outbox.order(EventName::OrderStatusChanged, &order);
        outbox.notify(Notification::reservation(
            NotificationKind::ReservationCheckedIn,
            reservation.user_id,
            reservation.id,
        ));

        uow.commit().await?;
        tracing::info!(reservation_id = %reservation.id, order_id = %order.id, "checked in");
        self.ctx.flush(outbox).await;
        Ok(ReservationView {
            reservation,
            order: Some(order),
        })
    }

    /// True while `now` is at or before the cancellation cutoff.
    pub async fn can_modify(&self, reservation_id: ReservationId) -> Result<bool> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let reservation = load_reservation(uow.as_mut(), reservation_id).await?;
        let info = scheduler::load_resource(uow.as_mut(), reservation.resource).await?;
        Ok(within_modify_window(&reservation, info.cancel_minutes, now))
    }

    pub async fn get_reservation(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
    ) -> Result<ReservationView> {
        let mut uow = self.ctx.begin().await?;
        let reservation = load_reservation(uow.as_mut(), reservation_id).await?;
        actor.ensure_can_access(reservation.user_id)?;
        let order = uow.order_for_reservation(reservation.id).await?;
        Ok(ReservationView { reservation, order })
    }

    pub async fn list_for_resource(
        &self,
        actor: &Actor,
        resource: ResourceRef,
    ) -> Result<Vec<Reservation>> {
        actor.ensure_staff()?;
        let mut uow = self.ctx.begin().await?;
        scheduler::load_resource(uow.as_mut(), resource).await?;
        Ok(uow.reservations_for_resource(resource).await?)
    }

    /// Issues a fresh deposit link after a failed or abandoned attempt.
    #[tracing::instrument(skip(self))]
    pub async fn request_deposit_payment(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
        client_ip: &str,
        bank_code: Option<String>,
    ) -> Result<PaymentLink> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let reservation = load_reservation(uow.as_mut(), reservation_id).await?;
        actor.ensure_can_access(reservation.user_id)?;
        if reservation.status != ReservationStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "reservation {} is {}",
                reservation.id, reservation.status
            )));
        }
        if !reservation.deposit_amount.is_positive() {
            return Err(DomainError::invalid_state("reservation requires no deposit"));
        }
        let payments = uow
            .payments_for(PaymentTarget::Reservation(reservation.id))
            .await?;
        if payments.iter().any(|p| p.status == PaymentStatus::Completed) {
            return Err(DomainError::Conflict(ConflictKind::PaymentAlreadyCompleted));
        }

        let link = issue_deposit_link(
            uow.as_mut(),
            self.ctx.gateway.as_ref(),
            &reservation,
            client_ip,
            bank_code,
            now,
        )
        .await?;
        outbox.reservation(EventName::ReservationDepositRequested, &reservation, None);

        uow.commit().await?;
        self.ctx.flush(outbox).await;
        Ok(link)
    }

    /// Confirmed reservations whose start lies more than `grace` in the past.
    pub async fn late_reservations(&self, grace: Duration) -> Result<Vec<Reservation>> {
        let cutoff = self.ctx.now() - grace;
        let mut uow = self.ctx.begin().await?;
        Ok(uow.confirmed_reservations_before(cutoff).await?)
    }

    /// Cancels a confirmed reservation nobody checked in for.
    ///
    /// Returns `false` without writing when the reservation no longer
    /// qualifies, so overlapping sweeps are harmless.
    #[tracing::instrument(skip(self))]
    pub async fn expire_if_late(
        &self,
        reservation_id: ReservationId,
        grace: Duration,
    ) -> Result<bool> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut reservation = load_reservation(uow.as_mut(), reservation_id).await?;
        if reservation.status != ReservationStatus::Confirmed
            || reservation.reservation_time >= now - grace
        {
            return Ok(false);
        }
        let checked_in = uow
            .order_for_reservation(reservation.id)
            .await?
            .is_some_and(|o| o.status != OrderStatus::Pending);
        if checked_in {
            return Ok(false);
        }

        apply_status(
            uow.as_mut(),
            &mut reservation,
            ReservationStatus::Cancelled,
            now,
            &mut outbox,
        )
        .await?;

        uow.commit().await?;
        tracing::info!(
            reservation_id = %reservation.id,
            reservation_time = %reservation.reservation_time,
            "late reservation cancelled"
        );
        self.ctx.flush(outbox).await;
        Ok(true)
    }

    async fn transition(
        &self,
        reservation_id: ReservationId,
        status: ReservationStatus,
    ) -> Result<ReservationView> {
        let now = self.ctx.now();
        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut reservation = load_reservation(uow.as_mut(), reservation_id).await?;
        if reservation.status == status {
            let order = uow.order_for_reservation(reservation.id).await?;
            return Ok(ReservationView { reservation, order });
        }
        let order =
            apply_status(uow.as_mut(), &mut reservation, status, now, &mut outbox).await?;

        uow.commit().await?;
        tracing::info!(
            reservation_id = %reservation.id,
            status = %reservation.status,
            "reservation status changed"
        );
        self.ctx.flush(outbox).await;
        Ok(ReservationView { reservation, order })
    }
}

/// Moves a reservation to `status` with its side effects on the linked
/// order and the resource.
pub(crate) async fn apply_status(
    uow: &mut dyn UnitOfWork,
    reservation: &mut Reservation,
    status: ReservationStatus,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<Option<Order>> {
    if !reservation.status.can_transition_to(status) {
        return Err(DomainError::invalid_state(format!(
            "reservation cannot move from {} to {}",
            reservation.status, status
        )));
    }
    reservation.status = status;
    reservation.updated_at = now;
    uow.update_reservation(reservation).await?;

    let (order, kind) = match status {
        ReservationStatus::Confirmed => (
            Some(ops::materialize_reservation_order(uow, reservation, now, outbox).await?),
            NotificationKind::ReservationConfirmed,
        ),
        _ => (
            ops::cancel_reservation_order(uow, reservation, now, outbox).await?,
            NotificationKind::ReservationCancelled,
        ),
    };
    scheduler::refresh_resource_status(uow, reservation.resource, now).await?;

    outbox.reservation(EventName::ReservationStatusChanged, reservation, order.as_ref());
    outbox.notify(Notification::reservation(kind, reservation.user_id, reservation.id));
    Ok(order)
}

/// Confirms a reservation whose deposit cleared.
///
/// Returns `None` for the order when the reservation was already cancelled;
/// the payment is still recorded but nothing is materialized.
pub(crate) async fn deposit_succeeded(
    uow: &mut dyn UnitOfWork,
    reservation_id: ReservationId,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> Result<(Reservation, Option<Order>)> {
    let mut reservation = load_reservation(uow, reservation_id).await?;
    let order = match reservation.status {
        ReservationStatus::Pending => {
            apply_status(uow, &mut reservation, ReservationStatus::Confirmed, now, outbox).await?
        }
        ReservationStatus::Confirmed => {
            Some(ops::materialize_reservation_order(uow, &reservation, now, outbox).await?)
        }
        ReservationStatus::Cancelled | ReservationStatus::NoShow => {
            tracing::warn!(
                reservation_id = %reservation.id,
                status = %reservation.status,
                "deposit received for a closed reservation"
            );
            None
        }
    };
    outbox.reservation(
        EventName::ReservationDepositCompleted,
        &reservation,
        order.as_ref(),
    );
    Ok((reservation, order))
}

/// Records a failed deposit. The reservation stays pending for a retry.
pub(crate) async fn deposit_failed(
    uow: &mut dyn UnitOfWork,
    reservation_id: ReservationId,
    outbox: &mut Outbox,
) -> Result<Reservation> {
    let reservation = load_reservation(uow, reservation_id).await?;
    outbox.reservation(EventName::ReservationDepositFailed, &reservation, None);
    outbox.notify(Notification::reservation(
        NotificationKind::DepositFailed,
        reservation.user_id,
        reservation.id,
    ));
    Ok(reservation)
}

pub(crate) async fn load_reservation(
    uow: &mut dyn UnitOfWork,
    id: ReservationId,
) -> Result<Reservation> {
    uow.get_reservation(id)
        .await?
        .ok_or_else(|| DomainError::not_found("reservation", id))
}

pub fn within_modify_window(
    reservation: &Reservation,
    cancel_minutes: i64,
    now: DateTime<Utc>,
) -> bool {
    now <= reservation.reservation_time - Duration::minutes(cancel_minutes)
}

fn ensure_modifiable(
    actor: &Actor,
    reservation: &Reservation,
    cancel_minutes: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    if actor.is_staff() || within_modify_window(reservation, cancel_minutes, now) {
        Ok(())
    } else {
        Err(DomainError::invalid_state(format!(
            "reservation can no longer be changed less than {cancel_minutes} minutes before it starts"
        )))
    }
}

fn ensure_capacity(num_people: u32, capacity: u32) -> Result<()> {
    if num_people > capacity {
        return Err(DomainError::validation(format!(
            "party of {num_people} exceeds capacity {capacity}"
        )));
    }
    Ok(())
}

async fn resolve_pre_order(
    uow: &mut dyn UnitOfWork,
    lines: &[ItemLine],
) -> Result<Vec<PreOrderItem>> {
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            return Err(DomainError::validation("pre-order quantity must be at least 1"));
        }
        let dish = uow
            .get_dish(line.dish_id)
            .await?
            .ok_or_else(|| DomainError::not_found("dish", line.dish_id))?;
        if !dish.active {
            return Err(DomainError::invalid_state(format!(
                "dish {} is unavailable",
                dish.name
            )));
        }
        items.push(PreOrderItem {
            dish_id: dish.id,
            quantity: line.quantity,
            price: dish.price,
        });
    }
    Ok(items)
}

async fn issue_deposit_link(
    uow: &mut dyn UnitOfWork,
    gateway: &dyn PaymentGateway,
    reservation: &Reservation,
    client_ip: &str,
    bank_code: Option<String>,
    now: DateTime<Utc>,
) -> Result<PaymentLink> {
    let reference =
        payment::unused_reference(uow, TxnRef::deposit(reservation.id, now)).await?;
    let payment_url = gateway.build_payment_url(&PaymentRequest {
        reference,
        amount: reservation.deposit_amount,
        order_info: format!("Dat coc dat ban {}", reservation.id),
        client_ip: client_ip.to_string(),
        bank_code,
        created_at: now,
    })?;

    let transaction_ref = reference.to_string();
    uow.insert_payment(&Payment::pending(
        PaymentTarget::Reservation(reservation.id),
        reservation.deposit_amount,
        PaymentMethod::Vnpay,
        transaction_ref.clone(),
        now,
    ))
    .await?;
    tracing::info!(
        reservation_id = %reservation.id,
        amount = %reservation.deposit_amount,
        reference = %transaction_ref,
        "deposit requested"
    );
    Ok(PaymentLink {
        transaction_ref,
        payment_url,
    })
}
