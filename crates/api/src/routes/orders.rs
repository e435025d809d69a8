//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{DishId, ItemStatus, OrderId, OrderItemId, OrderStatus, TableId};
use domain::order::{
    AddItem, CreateOrder, GuestAddItem, MergeOrders, RequestPayment, UpdateItemQuantity,
};
use domain::{OrderView, PaymentLink};
use serde::Deserialize;

use crate::error::ApiError;
use crate::identity::{ClientIp, Identity};
use crate::state::AppState;

type Shared = State<Arc<AppState>>;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub dish_id: DishId,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct ItemStatusRequest {
    pub status: ItemStatus,
}

#[derive(Deserialize)]
pub struct VoucherRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct MergeRequest {
    pub source_order_id: OrderId,
}

#[derive(Deserialize)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Deserialize)]
pub struct KitchenRequest {
    pub waiting: bool,
}

#[derive(Deserialize, Default)]
pub struct GatewayPaymentRequest {
    #[serde(default)]
    pub bank_code: Option<String>,
}

// -- Handlers --

/// POST /api/orders: seat a party and open its order.
#[tracing::instrument(skip(state, cmd))]
pub async fn create(
    State(state): Shared,
    Identity(actor): Identity,
    Json(cmd): Json<CreateOrder>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let view = state.engines.orders.create_order(&actor, cmd).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(state.engines.orders.get_order(&actor, id).await?))
}

/// POST /api/orders/{id}/items
#[tracing::instrument(skip(state, req))]
pub async fn add_item(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<OrderId>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let cmd = AddItem::new(id, req.dish_id, req.quantity);
    Ok(Json(state.engines.orders.add_item(&actor, cmd).await?))
}

/// PATCH /api/orders/items/{item_id}: zero removes the line.
#[tracing::instrument(skip(state, req))]
pub async fn update_item_quantity(
    State(state): Shared,
    Identity(actor): Identity,
    Path(item_id): Path<OrderItemId>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let cmd = UpdateItemQuantity::new(item_id, req.quantity);
    Ok(Json(
        state.engines.orders.update_item_quantity(&actor, cmd).await?,
    ))
}

/// DELETE /api/orders/items/{item_id}
#[tracing::instrument(skip(state))]
pub async fn delete_item(
    State(state): Shared,
    Identity(actor): Identity,
    Path(item_id): Path<OrderItemId>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(state.engines.orders.delete_item(&actor, item_id).await?))
}

/// PATCH /api/orders/items/{item_id}/status: kitchen progress.
#[tracing::instrument(skip(state, req))]
pub async fn update_item_status(
    State(state): Shared,
    Identity(actor): Identity,
    Path(item_id): Path<OrderItemId>,
    Json(req): Json<ItemStatusRequest>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(
        state
            .engines
            .orders
            .update_item_status(&actor, item_id, req.status)
            .await?,
    ))
}

/// POST /api/orders/{id}/voucher
#[tracing::instrument(skip(state, req))]
pub async fn apply_voucher(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<OrderId>,
    Json(req): Json<VoucherRequest>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(
        state
            .engines
            .orders
            .apply_voucher(&actor, id, req.code.trim())
            .await?,
    ))
}

/// DELETE /api/orders/{id}/voucher
#[tracing::instrument(skip(state))]
pub async fn remove_voucher(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(state.engines.orders.remove_voucher(&actor, id).await?))
}

/// POST /api/orders/{id}/merge: folds the source order into `{id}`.
#[tracing::instrument(skip(state, req))]
pub async fn merge(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<OrderId>,
    Json(req): Json<MergeRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let cmd = MergeOrders::new(req.source_order_id, id);
    Ok(Json(state.engines.orders.merge_orders(&actor, cmd).await?))
}

/// PATCH /api/orders/{id}/status
#[tracing::instrument(skip(state, req))]
pub async fn update_status(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<OrderId>,
    Json(req): Json<OrderStatusRequest>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(
        state
            .engines
            .orders
            .update_status(&actor, id, req.status)
            .await?,
    ))
}

/// PATCH /api/orders/{id}/kitchen
#[tracing::instrument(skip(state, req))]
pub async fn set_kitchen_confirmation(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<OrderId>,
    Json(req): Json<KitchenRequest>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(
        state
            .engines
            .orders
            .set_kitchen_confirmation(&actor, id, req.waiting)
            .await?,
    ))
}

/// POST /api/orders/{id}/payment/vnpay: returns the gateway redirect.
#[tracing::instrument(skip(state, req))]
pub async fn request_gateway_payment(
    State(state): Shared,
    Identity(actor): Identity,
    ClientIp(client_ip): ClientIp,
    Path(id): Path<OrderId>,
    req: Option<Json<GatewayPaymentRequest>>,
) -> Result<Json<PaymentLink>, ApiError> {
    let Json(req) = req.unwrap_or_default();
    let mut cmd = RequestPayment::new(id, client_ip);
    cmd.bank_code = req.bank_code;
    Ok(Json(state.engines.orders.request_payment(&actor, cmd).await?))
}

/// POST /api/orders/{id}/payment/cash
#[tracing::instrument(skip(state))]
pub async fn request_cash_payment(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(
        state.engines.orders.request_cash_payment(&actor, id).await?,
    ))
}

/// POST /api/orders/{id}/payment/cash/confirm: staff took the cash.
#[tracing::instrument(skip(state))]
pub async fn confirm_cash_payment(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(
        state.engines.orders.confirm_cash_payment(&actor, id).await?,
    ))
}

/// GET /api/tables/{table_id}/order: the walk-in order at a table, if any.
#[tracing::instrument(skip(state))]
pub async fn active_for_table(
    State(state): Shared,
    Path(table_id): Path<TableId>,
) -> Result<Json<Option<OrderView>>, ApiError> {
    Ok(Json(
        state.engines.orders.active_order_for_table(table_id).await?,
    ))
}

/// POST /api/tables/{table_id}/items: a guest orders from the table.
#[tracing::instrument(skip(state, req))]
pub async fn guest_add_item(
    State(state): Shared,
    Identity(actor): Identity,
    Path(table_id): Path<TableId>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let cmd = GuestAddItem::new(table_id, req.dish_id, req.quantity);
    Ok(Json(state.engines.orders.guest_add_item(&actor, cmd).await?))
}
