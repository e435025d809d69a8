//! Bill arithmetic.
//!
//! ```text
//! total = sum(price * quantity) over completed items
//! final = max(0, total + event_fee - deposit - voucher_discount)
//! ```

use chrono::{DateTime, Utc};

use common::{DiscountType, Money};
use store::{Order, OrderItem, Voucher};

use crate::{ConflictKind, DomainError, Result};

/// Dong spent per loyalty point earned.
pub const VND_PER_POINT: i64 = 1_000;

/// Sum of completed lines.
pub fn items_total(items: &[OrderItem]) -> Money {
    items
        .iter()
        .filter(|item| item.status.is_billable())
        .map(OrderItem::line_total)
        .sum()
}

pub fn final_amount(total: Money, event_fee: Money, deposit: Money, discount: Money) -> Money {
    (total + event_fee).saturating_sub(deposit + discount)
}

/// Discount a voucher grants on `total`, never more than `total`.
pub fn voucher_discount(voucher: &Voucher, total: Money) -> Money {
    let raw = match voucher.discount_type {
        DiscountType::Fixed => Money::vnd(voucher.value),
        DiscountType::Percentage => total.percent(voucher.value),
    };
    raw.min(total).max(Money::zero())
}

/// Checks that `voucher` may be applied to an order worth `total`.
pub fn ensure_voucher_usable(voucher: &Voucher, total: Money, now: DateTime<Utc>) -> Result<()> {
    if !voucher.active {
        return Err(DomainError::validation(format!(
            "voucher {} is not active",
            voucher.code
        )));
    }
    if voucher.expires_at.is_some_and(|expires| expires <= now) {
        return Err(DomainError::validation(format!(
            "voucher {} has expired",
            voucher.code
        )));
    }
    if voucher
        .max_uses
        .is_some_and(|max| voucher.current_uses >= max)
    {
        return Err(DomainError::Conflict(ConflictKind::VoucherExhausted));
    }
    if total < voucher.min_order_value {
        return Err(DomainError::validation(format!(
            "order total {total} is below the voucher minimum {}",
            voucher.min_order_value
        )));
    }
    Ok(())
}

/// Rewrites the order's monetary fields from its items and voucher.
pub fn apply_totals(order: &mut Order, items: &[OrderItem], voucher: Option<&Voucher>) {
    let total = items_total(items);
    let discount = voucher
        .map(|v| voucher_discount(v, total))
        .unwrap_or_default();
    order.total_amount = total;
    order.voucher_discount_amount = discount;
    order.final_amount = final_amount(total, order.event_fee, order.deposit_amount, discount);
}

/// Points earned for paying `amount`.
pub fn loyalty_points(amount: Money) -> i64 {
    amount.amount().max(0) / VND_PER_POINT
}
