//! Background maintenance for the restaurant engine.
//!
//! Two sweeps run beside the API:
//!
//! - confirmed reservations left unseated past their grace period are
//!   cancelled and their tables released
//! - customers who cancel or no-show too often in a month are banned

pub mod config;
pub mod error;
pub mod runner;
pub mod sweeps;

pub use config::SweepConfig;
pub use error::{JobError, Result};
pub use runner::{AutoCancelScheduler, BanScheduler, duration_until_midnight, spawn_all};
pub use sweeps::{SweepReport, auto_cancel_late_reservations, ban_repeat_offenders};
