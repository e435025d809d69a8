//! Order lifecycle.
//!
//! ```text
//! pending ──► dining ◄──► preparing ──► ready
//!              │              │           │
//!              └──────────────┴───────────┴──► waiting_payment ──► paid
//!
//! any non-terminal ──► cancelled
//! ```
//!
//! Walk-ins start `dining`; orders created for a reservation start
//! `pending` and move to `dining` at check-in.

pub mod billing;
pub mod commands;
pub mod engine;
pub(crate) mod ops;

pub use commands::{
    AddItem, CreateOrder, GuestAddItem, ItemLine, MergeOrders, OrderView, PaymentLink,
    RequestPayment, UpdateItemQuantity,
};
pub use engine::OrderEngine;
