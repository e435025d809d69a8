//! Order commands.

use serde::{Deserialize, Serialize};

use common::{DishId, OrderId, OrderItemId, ResourceRef, TableId};
use store::{Order, OrderItem};

/// A dish and how many of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLine {
    pub dish_id: DishId,
    pub quantity: u32,
}

impl ItemLine {
    pub fn new(dish_id: DishId, quantity: u32) -> Self {
        Self { dish_id, quantity }
    }
}

/// Seats a walk-in party at a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrder {
    pub resource: ResourceRef,
    #[serde(default)]
    pub items: Vec<ItemLine>,
}

impl CreateOrder {
    pub fn new(resource: impl Into<ResourceRef>) -> Self {
        Self {
            resource: resource.into(),
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, dish_id: DishId, quantity: u32) -> Self {
        self.items.push(ItemLine::new(dish_id, quantity));
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AddItem {
    pub order_id: OrderId,
    pub dish_id: DishId,
    pub quantity: u32,
}

impl AddItem {
    pub fn new(order_id: OrderId, dish_id: DishId, quantity: u32) -> Self {
        Self {
            order_id,
            dish_id,
            quantity,
        }
    }
}

/// Zero removes the line; negative quantities are rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateItemQuantity {
    pub item_id: OrderItemId,
    pub quantity: i64,
}

impl UpdateItemQuantity {
    pub fn new(item_id: OrderItemId, quantity: i64) -> Self {
        Self { item_id, quantity }
    }
}

/// Folds `source` into `target`, then cancels `source`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MergeOrders {
    pub source: OrderId,
    pub target: OrderId,
}

impl MergeOrders {
    pub fn new(source: OrderId, target: OrderId) -> Self {
        Self { source, target }
    }
}

/// Asks the gateway for a payment link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayment {
    pub order_id: OrderId,
    pub client_ip: String,
    #[serde(default)]
    pub bank_code: Option<String>,
}

impl RequestPayment {
    pub fn new(order_id: OrderId, client_ip: impl Into<String>) -> Self {
        Self {
            order_id,
            client_ip: client_ip.into(),
            bank_code: None,
        }
    }
}

/// A guest at a table orders without an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GuestAddItem {
    pub table_id: TableId,
    pub dish_id: DishId,
    pub quantity: u32,
}

impl GuestAddItem {
    pub fn new(table_id: TableId, dish_id: DishId, quantity: u32) -> Self {
        Self {
            table_id,
            dish_id,
            quantity,
        }
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderView {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// A gateway redirect issued for an order or deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentLink {
    pub transaction_ref: String,
    pub payment_url: String,
}
