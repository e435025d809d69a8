//! Persisted record shapes.
//!
//! These are plain data. Lifecycle rules live in the domain crate; the
//! store only guarantees that what is committed together stays together.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{
    DiscountType, DishId, ItemStatus, Money, OrderId, OrderItemId, OrderPaymentStatus, OrderStatus,
    PaymentId, PaymentMethod, PaymentStatus, Ranking, ReservationId, ReservationStatus,
    ResourceRef, ResourceStatus, TableGroupId, TableId, UserId, UserRole, VoucherId,
};

/// Default minutes before the reservation start after which it can no
/// longer be modified or cancelled by the customer.
pub const DEFAULT_CANCEL_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub table_number: String,
    pub capacity: u32,
    pub deposit: Money,
    pub cancel_minutes: i64,
    pub status: ResourceStatus,
}

impl Table {
    pub fn new(table_number: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: TableId::new(),
            table_number: table_number.into(),
            capacity,
            deposit: Money::zero(),
            cancel_minutes: DEFAULT_CANCEL_MINUTES,
            status: ResourceStatus::Available,
        }
    }

    pub fn with_deposit(mut self, deposit: Money) -> Self {
        self.deposit = deposit;
        self
    }

    pub fn with_cancel_minutes(mut self, minutes: i64) -> Self {
        self.cancel_minutes = minutes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGroup {
    pub id: TableGroupId,
    pub group_name: String,
    pub table_ids: Vec<TableId>,
    pub total_capacity: u32,
    pub deposit: Money,
    pub cancel_minutes: i64,
    pub status: ResourceStatus,
}

impl TableGroup {
    pub fn new(group_name: impl Into<String>, tables: &[Table]) -> Self {
        Self {
            id: TableGroupId::new(),
            group_name: group_name.into(),
            table_ids: tables.iter().map(|t| t.id).collect(),
            total_capacity: tables.iter().map(|t| t.capacity).sum(),
            deposit: tables.iter().map(|t| t.deposit).sum(),
            cancel_minutes: DEFAULT_CANCEL_MINUTES,
            status: ResourceStatus::Available,
        }
    }

    pub fn with_deposit(mut self, deposit: Money) -> Self {
        self.deposit = deposit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub id: DishId,
    pub name: String,
    pub price: Money,
    pub active: bool,
}

impl Dish {
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        Self {
            id: DishId::new(),
            name: name.into(),
            price,
            active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: UserRole,
    pub ranking: Ranking,
    pub points: i64,
    /// Set when the account has been banned.
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn customer(username: impl Into<String>) -> Self {
        Self::with_role(username, UserRole::Customer)
    }

    pub fn with_role(username: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            role,
            ranking: Ranking::Regular,
            points: 0,
            deactivated_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_banned(&self) -> bool {
        self.deactivated_at.is_some()
    }
}

/// A dish ordered ahead of arrival, captured at reservation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreOrderItem {
    pub dish_id: DishId,
    pub quantity: u32,
    /// Unit price at the time the pre-order was placed.
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub user_id: Option<UserId>,
    pub resource: ResourceRef,
    pub reservation_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub num_people: u32,
    pub status: ReservationStatus,
    pub deposit_amount: Money,
    pub pre_order_items: Vec<PreOrderItem>,
    pub event_id: Option<Uuid>,
    pub event_fee: Money,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// End of the booked window (exclusive).
    pub fn window_end(&self) -> DateTime<Utc> {
        self.reservation_time + Duration::minutes(self.duration_minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub resource: ResourceRef,
    pub reservation_id: Option<ReservationId>,
    pub voucher_id: Option<VoucherId>,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub waiting_kitchen_confirmation: bool,
    pub total_amount: Money,
    pub voucher_discount_amount: Money,
    pub event_fee: Money,
    pub deposit_amount: Money,
    pub final_amount: Money,
    /// Set once loyalty points have been credited for this order.
    pub loyalty_credited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub dish_id: DishId,
    pub quantity: u32,
    pub price: Money,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    pub code: String,
    pub discount_type: DiscountType,
    /// Percent points for percentage vouchers, whole dong for fixed ones.
    pub value: i64,
    pub min_order_value: Money,
    pub max_uses: Option<u32>,
    pub current_uses: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl Voucher {
    pub fn new(code: impl Into<String>, discount_type: DiscountType, value: i64) -> Self {
        Self {
            id: VoucherId::new(),
            code: code.into(),
            discount_type,
            value,
            min_order_value: Money::zero(),
            max_uses: None,
            current_uses: 0,
            expires_at: None,
            active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherUsage {
    pub voucher_id: VoucherId,
    pub order_id: OrderId,
    pub user_id: Option<UserId>,
    pub used_at: DateTime<Utc>,
}

/// What a payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PaymentTarget {
    Order(OrderId),
    Reservation(ReservationId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub target: PaymentTarget,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Merchant reference sent to the gateway. Unique across payments.
    pub transaction_ref: String,
    pub gateway_transaction_no: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn pending(
        target: PaymentTarget,
        amount: Money,
        method: PaymentMethod,
        transaction_ref: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            target,
            amount,
            method,
            status: PaymentStatus::Pending,
            transaction_ref: transaction_ref.into(),
            gateway_transaction_no: None,
            created_at: now,
            updated_at: now,
        }
    }
}
