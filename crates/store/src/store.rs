use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::{
    DishId, OrderId, OrderItemId, PaymentStatus, ReservationId, ResourceRef, ResourceStatus,
    TableGroupId, TableId, UserId, VoucherId,
};

use crate::{
    Dish, Order, OrderItem, Payment, PaymentTarget, Reservation, Result, Table, TableGroup, User,
    Voucher, VoucherUsage,
};

/// Number of cancelled or no-show reservations a user accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffenseCount {
    pub user_id: UserId,
    pub count: u64,
}

/// Entry point for persistence backends.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// Starts a new unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// A transactional view of the store.
///
/// Reads observe the unit's own uncommitted writes. Nothing is visible to
/// other units until [`UnitOfWork::commit`] succeeds; dropping the unit
/// rolls everything back.
#[async_trait]
pub trait UnitOfWork: Send {
    // -- resources ---------------------------------------------------------

    async fn insert_table(&mut self, table: &Table) -> Result<()>;
    async fn get_table(&mut self, id: TableId) -> Result<Option<Table>>;
    async fn insert_table_group(&mut self, group: &TableGroup) -> Result<()>;
    async fn get_table_group(&mut self, id: TableGroupId) -> Result<Option<TableGroup>>;
    /// Groups that list `table` among their members.
    async fn groups_containing(&mut self, table: TableId) -> Result<Vec<TableGroup>>;

    /// Sets the physical status of a table or group.
    ///
    /// Setting a group's status also sets every member table.
    async fn set_resource_status(
        &mut self,
        resource: ResourceRef,
        status: ResourceStatus,
    ) -> Result<()>;

    /// Serializes concurrent bookings of the same resource until this unit
    /// finishes. Fails with `Missing` if the resource does not exist.
    async fn lock_resource(&mut self, resource: ResourceRef) -> Result<()>;

    // -- catalog and people ------------------------------------------------

    async fn insert_dish(&mut self, dish: &Dish) -> Result<()>;
    async fn get_dish(&mut self, id: DishId) -> Result<Option<Dish>>;
    async fn insert_user(&mut self, user: &User) -> Result<()>;
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>>;
    async fn update_user(&mut self, user: &User) -> Result<()>;

    // -- reservations ------------------------------------------------------

    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<()>;
    async fn get_reservation(&mut self, id: ReservationId) -> Result<Option<Reservation>>;
    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<()>;

    /// All reservations on a resource, ordered by start time.
    async fn reservations_for_resource(&mut self, resource: ResourceRef)
    -> Result<Vec<Reservation>>;

    /// Confirmed reservations that started strictly before `cutoff`.
    async fn confirmed_reservations_before(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>>;

    /// Per-user counts of cancelled and no-show reservations created in
    /// `[from, to)`.
    async fn offense_counts(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OffenseCount>>;

    // -- orders ------------------------------------------------------------

    async fn insert_order(&mut self, order: &Order) -> Result<()>;
    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Non-terminal orders on a resource, oldest first.
    async fn active_orders_for_resource(&mut self, resource: ResourceRef) -> Result<Vec<Order>>;

    async fn order_for_reservation(&mut self, reservation_id: ReservationId)
    -> Result<Option<Order>>;

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()>;
    async fn get_order_item(&mut self, id: OrderItemId) -> Result<Option<OrderItem>>;
    async fn update_order_item(&mut self, item: &OrderItem) -> Result<()>;
    async fn delete_order_item(&mut self, id: OrderItemId) -> Result<()>;

    /// Items of an order, oldest first.
    async fn items_for_order(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    // -- vouchers ----------------------------------------------------------

    async fn insert_voucher(&mut self, voucher: &Voucher) -> Result<()>;
    async fn get_voucher(&mut self, id: VoucherId) -> Result<Option<Voucher>>;
    /// Locks the voucher row until the unit finishes.
    async fn get_voucher_by_code(&mut self, code: &str) -> Result<Option<Voucher>>;
    async fn update_voucher(&mut self, voucher: &Voucher) -> Result<()>;
    async fn insert_voucher_usage(&mut self, usage: &VoucherUsage) -> Result<()>;

    // -- payments ----------------------------------------------------------

    /// Fails with `Duplicate` if the transaction reference is taken.
    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;
    async fn update_payment(&mut self, payment: &Payment) -> Result<()>;
    async fn get_payment_by_ref(&mut self, transaction_ref: &str) -> Result<Option<Payment>>;
    async fn payments_for(&mut self, target: PaymentTarget) -> Result<Vec<Payment>>;

    /// Moves a pending payment to `status`.
    ///
    /// Returns `false` without writing when the payment is not pending,
    /// which makes repeated gateway notifications harmless.
    async fn settle_payment(
        &mut self,
        transaction_ref: &str,
        status: PaymentStatus,
        gateway_transaction_no: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Makes every write in this unit durable.
    async fn commit(self: Box<Self>) -> Result<()>;
}
