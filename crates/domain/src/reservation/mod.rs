//! Reservations: booking a resource ahead of time, collecting the deposit
//! and handing over to an order at check-in.
//!
//! ```text
//! Pending ──deposit ok──▶ Confirmed ──check-in──▶ (order Dining)
//!    │                        │
//!    └──────cancel───────▶ Cancelled ◀──┘   Confirmed ──no show──▶ NoShow
//! ```

pub mod commands;
pub mod deposit;
pub mod engine;

pub use commands::{CreateReservation, ReservationCreated, ReservationView, UpdateReservation};
pub use deposit::DepositPath;
pub use engine::ReservationEngine;
