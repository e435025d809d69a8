//! Persistence for the restaurant engine.
//!
//! Every engine operation runs inside a [`UnitOfWork`] obtained from a
//! [`Store`]. Writes become visible only after [`UnitOfWork::commit`];
//! dropping a unit of work without committing discards its changes.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{
    Dish, Order, OrderItem, Payment, PaymentTarget, PreOrderItem, Reservation, Table, TableGroup,
    User, Voucher, VoucherUsage,
};
pub use store::{OffenseCount, Store, UnitOfWork};
