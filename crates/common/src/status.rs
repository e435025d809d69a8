//! Status vocabularies and their transition rules.
//!
//! Order status transitions:
//! ```text
//! Pending ──► Dining ◄──► Preparing ──► Ready
//!    │          │             │           │
//!    └──────────┴─────────────┴───────────┴──► WaitingPayment ──► Paid
//!
//! any non-terminal ──► Cancelled
//! ```
//!
//! Reservation status transitions:
//! ```text
//! Pending ──► Confirmed ──► NoShow
//!    │            │
//!    └────────────┴──► Cancelled
//! ```

use serde::{Deserialize, Serialize};

/// A stored status string did not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the wire/storage name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseStatusError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created but the party is not seated yet (pre-orders, fresh walk-ins).
    #[default]
    Pending,
    /// The party is seated and eating.
    Dining,
    /// Kitchen is working on the order.
    Preparing,
    /// Kitchen has finished the current batch.
    Ready,
    /// The bill has been requested.
    WaitingPayment,
    /// Settled (terminal).
    Paid,
    /// Abandoned (terminal).
    Cancelled,
}

string_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Dining => "dining",
    Preparing => "preparing",
    Ready => "ready",
    WaitingPayment => "waiting_payment",
    Paid => "paid",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Returns true while the order holds its table.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Returns true if new items may be added.
    pub fn accepts_items(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Dining
        )
    }

    /// Returns true if the bill may be requested.
    pub fn can_request_payment(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Dining | OrderStatus::Preparing | OrderStatus::Ready
        )
    }

    /// Returns true if a voucher may be applied or removed.
    pub fn can_change_voucher(&self) -> bool {
        self.is_active()
    }

    /// Returns true if the order may move to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (*self, next) {
            (Paid | Cancelled, _) => false,
            (_, Cancelled) => true,
            (Pending, Dining | Preparing | WaitingPayment) => true,
            (Dining, Preparing | WaitingPayment) => true,
            (Preparing, Ready | Dining | WaitingPayment) => true,
            (Ready, Dining | WaitingPayment) => true,
            (WaitingPayment, Paid | Dining) => true,
            _ => false,
        }
    }
}

/// Settlement state tracked on the order itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

string_enum!(OrderPaymentStatus, "order payment status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
});

/// Kitchen state of a single order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

string_enum!(ItemStatus, "item status", {
    Pending => "pending",
    Preparing => "preparing",
    Ready => "ready",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl ItemStatus {
    fn rank(&self) -> u8 {
        match self {
            ItemStatus::Pending => 0,
            ItemStatus::Preparing => 1,
            ItemStatus::Ready => 2,
            ItemStatus::Completed => 3,
            ItemStatus::Cancelled => 4,
        }
    }

    /// Only completed lines count toward the bill.
    pub fn is_billable(&self) -> bool {
        matches!(self, ItemStatus::Completed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Cancelled)
    }

    /// Items only move forward through the kitchen, or get cancelled
    /// before completion.
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            ItemStatus::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }
}

/// Lifecycle state of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Waiting for the deposit to clear.
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    NoShow,
}

string_enum!(ReservationStatus, "reservation status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    NoShow => "no_show",
});

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Cancelled | ReservationStatus::NoShow)
    }

    /// Non-terminal reservations hold their window on the resource.
    pub fn holds_window(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the reservation may move to `next`.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (*self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) | (Confirmed, NoShow)
        )
    }

    /// Statuses that count toward the monthly ban threshold.
    pub fn counts_as_offense(&self) -> bool {
        self.is_terminal()
    }
}

/// Physical state of a table or table group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    #[default]
    Available,
    Occupied,
    Cleaning,
    Reserved,
}

string_enum!(ResourceStatus, "resource status", {
    Available => "available",
    Occupied => "occupied",
    Cleaning => "cleaning",
    Reserved => "reserved",
});

/// Status of a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// How a bill or deposit was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Vnpay,
    Card,
    Qr,
}

string_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    Vnpay => "vnpay",
    Card => "card",
    Qr => "qr",
});

impl PaymentMethod {
    /// Online methods go through the payment gateway.
    pub fn is_online(&self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

string_enum!(DiscountType, "discount type", {
    Percentage => "percentage",
    Fixed => "fixed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    Employee,
    Admin,
}

string_enum!(UserRole, "user role", {
    Customer => "customer",
    Employee => "employee",
    Admin => "admin",
});

impl UserRole {
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Employee | UserRole::Admin)
    }
}

/// Loyalty tier derived from accumulated points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    #[default]
    Regular,
    Vip,
    Platinum,
}

string_enum!(Ranking, "ranking", {
    Regular => "regular",
    Vip => "vip",
    Platinum => "platinum",
});

impl Ranking {
    pub const VIP_THRESHOLD: i64 = 1_000;
    pub const PLATINUM_THRESHOLD: i64 = 2_500;

    /// Returns the tier earned by a point balance.
    pub fn for_points(points: i64) -> Ranking {
        if points >= Self::PLATINUM_THRESHOLD {
            Ranking::Platinum
        } else if points >= Self::VIP_THRESHOLD {
            Ranking::Vip
        } else {
            Ranking::Regular
        }
    }

    /// VIP and above may pre-order without a deposit.
    pub fn is_vip(&self) -> bool {
        *self >= Ranking::Vip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_default_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn order_terminal_states() {
        assert!(OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::WaitingPayment.is_terminal());
        assert!(OrderStatus::WaitingPayment.is_active());
    }

    #[test]
    fn order_accepts_items() {
        assert!(OrderStatus::Pending.accepts_items());
        assert!(OrderStatus::Preparing.accepts_items());
        assert!(OrderStatus::Dining.accepts_items());
        assert!(!OrderStatus::Ready.accepts_items());
        assert!(!OrderStatus::WaitingPayment.accepts_items());
        assert!(!OrderStatus::Paid.accepts_items());
        assert!(!OrderStatus::Cancelled.accepts_items());
    }

    #[test]
    fn order_paid_only_from_waiting_payment() {
        assert!(OrderStatus::WaitingPayment.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Dining.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn order_terminal_states_are_final() {
        for next in [
            OrderStatus::Pending,
            OrderStatus::Dining,
            OrderStatus::WaitingPayment,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
        ] {
            assert!(!OrderStatus::Paid.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn order_any_active_can_cancel() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Dining,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::WaitingPayment,
        ] {
            assert!(s.can_transition_to(OrderStatus::Cancelled), "{s}");
        }
    }

    #[test]
    fn order_status_parses_storage_names() {
        assert_eq!("waiting_payment".parse(), Ok(OrderStatus::WaitingPayment));
        assert!("WaitingPayment".parse::<OrderStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&OrderStatus::WaitingPayment).unwrap(),
            "\"waiting_payment\""
        );
    }

    #[test]
    fn item_moves_forward_only() {
        assert!(ItemStatus::Pending.can_transition_to(ItemStatus::Preparing));
        assert!(ItemStatus::Pending.can_transition_to(ItemStatus::Completed));
        assert!(ItemStatus::Ready.can_transition_to(ItemStatus::Completed));
        assert!(!ItemStatus::Ready.can_transition_to(ItemStatus::Pending));
        assert!(!ItemStatus::Completed.can_transition_to(ItemStatus::Cancelled));
        assert!(ItemStatus::Preparing.can_transition_to(ItemStatus::Cancelled));
    }

    #[test]
    fn only_completed_items_are_billable() {
        assert!(ItemStatus::Completed.is_billable());
        assert!(!ItemStatus::Ready.is_billable());
        assert!(!ItemStatus::Cancelled.is_billable());
    }

    #[test]
    fn reservation_transitions() {
        use ReservationStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(!Pending.can_transition_to(NoShow));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!NoShow.can_transition_to(Cancelled));
    }

    #[test]
    fn reservation_window_holders() {
        assert!(ReservationStatus::Pending.holds_window());
        assert!(ReservationStatus::Confirmed.holds_window());
        assert!(!ReservationStatus::Cancelled.holds_window());
        assert!(!ReservationStatus::NoShow.holds_window());
    }

    #[test]
    fn ranking_thresholds() {
        assert_eq!(Ranking::for_points(0), Ranking::Regular);
        assert_eq!(Ranking::for_points(999), Ranking::Regular);
        assert_eq!(Ranking::for_points(1_000), Ranking::Vip);
        assert_eq!(Ranking::for_points(2_499), Ranking::Vip);
        assert_eq!(Ranking::for_points(2_500), Ranking::Platinum);
        assert!(Ranking::Platinum.is_vip());
        assert!(!Ranking::Regular.is_vip());
    }

    #[test]
    fn unknown_value_reports_kind() {
        let err = "teleported".parse::<ReservationStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown reservation status value: teleported");
    }
}
