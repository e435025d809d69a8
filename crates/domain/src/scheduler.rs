//! Interval scheduling over tables and table groups.
//!
//! Windows are half-open: `[start, end)`. Two windows overlap iff
//! `a.start < b.end && b.start < a.end`, so back-to-back bookings never
//! collide.
//!
//! Every non-terminal reservation holds its declared window. Orders have
//! no declared end: a pending order created for a reservation holds that
//! reservation's window, any other active order holds the table from its
//! creation until at least [`DEFAULT_DURATION_MINUTES`] from now.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use common::{Money, OrderId, OrderStatus, ReservationId, ResourceRef, ResourceStatus};
use store::{Order, Reservation, UnitOfWork};

use crate::{ConflictKind, DomainError, Result};

/// Length of a reservation when none is given, and of a walk-in's
/// expected stay.
pub const DEFAULT_DURATION_MINUTES: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Fails if the window is empty or inverted.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(DomainError::validation("time window must have positive length"));
        }
        Ok(Self { start, end })
    }

    pub fn from_duration(start: DateTime<Utc>, minutes: i64) -> Result<Self> {
        if minutes <= 0 {
            return Err(DomainError::validation(format!(
                "duration must be positive, got {minutes} minutes"
            )));
        }
        Self::new(start, start + Duration::minutes(minutes))
    }

    pub fn of_reservation(reservation: &Reservation) -> Result<Self> {
        Self::from_duration(reservation.reservation_time, reservation.duration_minutes)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// The record holding a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    Reservation(ReservationId),
    Order(OrderId),
}

impl std::fmt::Display for Holder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Holder::Reservation(id) => write!(f, "reservation {id}"),
            Holder::Order(id) => write!(f, "order {id}"),
        }
    }
}

/// A committed claim on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub holder: Holder,
    pub window: TimeWindow,
    /// Reservation this booking belongs to, if any.
    pub reservation_id: Option<ReservationId>,
    /// True when guests are physically at the resource.
    pub occupying: bool,
}

/// Bookings an overlap check should ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclude {
    /// The reservation and the order created for it.
    Reservation(ReservationId),
    Order(OrderId),
}

impl Exclude {
    fn matches(&self, booking: &Booking) -> bool {
        match self {
            Exclude::Reservation(id) => booking.reservation_id == Some(*id),
            Exclude::Order(id) => booking.holder == Holder::Order(*id),
        }
    }
}

/// Window held by an active order.
pub fn order_window(
    order: &Order,
    linked: Option<&Reservation>,
    now: DateTime<Utc>,
) -> Result<TimeWindow> {
    if order.status == OrderStatus::Pending {
        if let Some(reservation) = linked {
            return TimeWindow::of_reservation(reservation);
        }
    }
    let start = order.created_at;
    let end = start.max(now) + Duration::minutes(DEFAULT_DURATION_MINUTES);
    TimeWindow::new(start, end)
}

/// Window a walk-in seated at `now` asks for.
pub fn walk_in_window(now: DateTime<Utc>) -> TimeWindow {
    TimeWindow {
        start: now,
        end: now + Duration::minutes(DEFAULT_DURATION_MINUTES),
    }
}

/// `resource` plus every resource sharing a physical table with it: the
/// member tables of a group, or the groups a table belongs to.
pub async fn related_resources(
    uow: &mut dyn UnitOfWork,
    resource: ResourceRef,
) -> Result<Vec<ResourceRef>> {
    let mut related = vec![resource];
    match resource {
        ResourceRef::Table(id) => {
            for group in uow.groups_containing(id).await? {
                related.push(ResourceRef::TableGroup(group.id));
            }
        }
        ResourceRef::TableGroup(id) => {
            if let Some(group) = uow.get_table_group(id).await? {
                related.extend(group.table_ids.into_iter().map(ResourceRef::Table));
            }
        }
    }
    Ok(related)
}

/// Locks `resources` and everything related to them, in a fixed order so
/// two units never wait on each other.
pub async fn lock_resources(uow: &mut dyn UnitOfWork, resources: &[ResourceRef]) -> Result<()> {
    let mut all = Vec::new();
    for resource in resources {
        all.extend(related_resources(uow, *resource).await?);
    }
    all.sort();
    all.dedup();
    for resource in all {
        uow.lock_resource(resource).await?;
    }
    Ok(())
}

/// Everything currently holding time on `resource` or a resource sharing
/// its tables.
pub async fn bookings(
    uow: &mut dyn UnitOfWork,
    resource: ResourceRef,
    now: DateTime<Utc>,
) -> Result<Vec<Booking>> {
    let mut bookings = Vec::new();
    for related in related_resources(uow, resource).await? {
        bookings.extend(bookings_on(uow, related, now).await?);
    }
    Ok(bookings)
}

async fn bookings_on(
    uow: &mut dyn UnitOfWork,
    resource: ResourceRef,
    now: DateTime<Utc>,
) -> Result<Vec<Booking>> {
    let mut bookings = Vec::new();
    let mut covered: HashSet<ReservationId> = HashSet::new();

    for order in uow.active_orders_for_resource(resource).await? {
        let linked = match order.reservation_id {
            Some(id) => uow.get_reservation(id).await?,
            None => None,
        };
        if let Some(id) = order.reservation_id {
            covered.insert(id);
        }
        bookings.push(Booking {
            holder: Holder::Order(order.id),
            window: order_window(&order, linked.as_ref(), now)?,
            reservation_id: order.reservation_id,
            occupying: order.status != OrderStatus::Pending,
        });
    }

    for reservation in uow.reservations_for_resource(resource).await? {
        if !reservation.status.holds_window() || covered.contains(&reservation.id) {
            continue;
        }
        // A finished order means the reservation has been served.
        if uow.order_for_reservation(reservation.id).await?.is_some() {
            continue;
        }
        bookings.push(Booking {
            holder: Holder::Reservation(reservation.id),
            window: TimeWindow::of_reservation(&reservation)?,
            reservation_id: Some(reservation.id),
            occupying: false,
        });
    }

    Ok(bookings)
}

/// First booking colliding with `candidate`, ignoring `exclude`.
pub fn find_conflict<'a>(
    bookings: &'a [Booking],
    candidate: &TimeWindow,
    exclude: Option<Exclude>,
) -> Option<&'a Booking> {
    bookings
        .iter()
        .filter(|b| !exclude.is_some_and(|e| e.matches(b)))
        .find(|b| b.window.overlaps(candidate))
}

/// Fails with `Conflict(Overlap)` if `candidate` collides with any other
/// booking on `resource`.
pub async fn check_overlap(
    uow: &mut dyn UnitOfWork,
    resource: ResourceRef,
    candidate: TimeWindow,
    exclude: Option<Exclude>,
    now: DateTime<Utc>,
) -> Result<()> {
    let bookings = bookings(uow, resource, now).await?;
    match find_conflict(&bookings, &candidate, exclude) {
        Some(existing) => {
            tracing::debug!(
                resource = %resource,
                holder = %existing.holder,
                "overlap rejected"
            );
            Err(DomainError::Conflict(ConflictKind::Overlap {
                start: existing.window.start(),
                end: existing.window.end(),
                holder: existing.holder.to_string(),
            }))
        }
        None => Ok(()),
    }
}

/// Recomputes the cached status of `resource` from its bookings.
pub async fn refresh_resource_status(
    uow: &mut dyn UnitOfWork,
    resource: ResourceRef,
    now: DateTime<Utc>,
) -> Result<ResourceStatus> {
    let bookings = bookings(uow, resource, now).await?;
    let soon = walk_in_window(now);
    let status = if bookings.iter().any(|b| b.occupying) {
        ResourceStatus::Occupied
    } else if bookings.iter().any(|b| b.window.overlaps(&soon)) {
        ResourceStatus::Reserved
    } else {
        ResourceStatus::Available
    };
    uow.set_resource_status(resource, status).await?;
    Ok(status)
}

/// Booking-relevant attributes shared by tables and table groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub resource: ResourceRef,
    pub capacity: u32,
    pub deposit: Money,
    pub cancel_minutes: i64,
    pub status: ResourceStatus,
}

pub async fn load_resource(
    uow: &mut dyn UnitOfWork,
    resource: ResourceRef,
) -> Result<ResourceInfo> {
    match resource {
        ResourceRef::Table(id) => {
            let table = uow
                .get_table(id)
                .await?
                .ok_or_else(|| DomainError::not_found("table", id))?;
            Ok(ResourceInfo {
                resource,
                capacity: table.capacity,
                deposit: table.deposit,
                cancel_minutes: table.cancel_minutes,
                status: table.status,
            })
        }
        ResourceRef::TableGroup(id) => {
            let group = uow
                .get_table_group(id)
                .await?
                .ok_or_else(|| DomainError::not_found("table group", id))?;
            Ok(ResourceInfo {
                resource,
                capacity: group.total_capacity,
                deposit: group.deposit,
                cancel_minutes: group.cancel_minutes,
                status: group.status,
            })
        }
    }
}
