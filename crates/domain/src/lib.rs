//! Restaurant lifecycle engines.
//!
//! This crate owns the rules; persistence, the payment gateway and realtime
//! delivery are reached through the traits in `store`, `gateway` and
//! `fanout`. It provides:
//! - the interval scheduler that keeps bookings of a table or table group
//!   from overlapping
//! - [`OrderEngine`] for walk-in seating, items, vouchers, merges and billing
//! - [`ReservationEngine`] for bookings, deposits and check-in
//! - [`PaymentReconciler`] for idempotent handling of gateway callbacks
//!
//! Every operation runs in one unit of work. Events and notifications are
//! staged in an [`Outbox`] and released only after the unit commits.

pub mod actor;
pub mod clock;
pub mod context;
pub mod error;
pub mod notify;
pub mod order;
pub mod payment;
pub mod reservation;
pub mod scheduler;
mod snapshot;

pub use actor::Actor;
pub use clock::{Clock, FixedClock, SystemClock};
pub use context::{EngineContext, Outbox};
pub use error::{ConflictKind, DomainError, Result};
pub use notify::{
    LogNotifier, NoopNotifier, Notification, NotificationKind, Notifier, RecordingNotifier,
};
pub use order::{OrderEngine, OrderView, PaymentLink};
pub use payment::{CallbackOutcome, PaymentReconciler, ipn_response, return_redirect_url};
pub use reservation::{
    CreateReservation, ReservationCreated, ReservationEngine, ReservationView, UpdateReservation,
};
pub use scheduler::{DEFAULT_DURATION_MINUTES, TimeWindow};

/// All three engines sharing one context.
#[derive(Debug, Clone)]
pub struct Engines {
    pub orders: OrderEngine,
    pub reservations: ReservationEngine,
    pub payments: PaymentReconciler,
}

impl Engines {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            orders: OrderEngine::new(ctx.clone()),
            reservations: ReservationEngine::new(ctx.clone()),
            payments: PaymentReconciler::new(ctx),
        }
    }
}
