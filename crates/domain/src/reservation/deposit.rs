//! Deposit rules.
//!
//! `deposit = event_fee + 30% of the pre-order subtotal + resource deposit`.

use common::{Money, Ranking};
use store::PreOrderItem;

/// Share of the pre-order subtotal collected up front.
pub const PRE_ORDER_DEPOSIT_PERCENT: i64 = 30;

pub fn pre_order_subtotal(items: &[PreOrderItem]) -> Money {
    items.iter().map(|i| i.price.multiply(i.quantity)).sum()
}

pub fn required_deposit(event_fee: Money, pre_order_subtotal: Money, resource_deposit: Money) -> Money {
    event_fee + pre_order_subtotal.percent(PRE_ORDER_DEPOSIT_PERCENT) + resource_deposit
}

/// How a new reservation gets confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositPath {
    /// VIP with a pre-order: confirmed at once, no deposit taken.
    VipFastPath,
    /// Stays pending until the deposit clears.
    PaymentRequired(Money),
    /// Nothing to collect: confirmed at once.
    NoDeposit,
}

pub fn choose_path(ranking: Option<Ranking>, has_pre_order: bool, deposit: Money) -> DepositPath {
    if has_pre_order && ranking.is_some_and(|r| r.is_vip()) {
        DepositPath::VipFastPath
    } else if deposit.is_positive() {
        DepositPath::PaymentRequired(deposit)
    } else {
        DepositPath::NoDeposit
    }
}
