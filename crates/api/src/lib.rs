//! HTTP boundary for the restaurant engine.
//!
//! Thin axum handlers over the domain engines: order and reservation
//! endpoints, the payment gateway's return and IPN callbacks, plus health
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    use routes::{health, orders, payments, reservations};

    let metrics_router = Router::new()
        .route("/metrics", get(health::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(health::check))
        .route("/api/payments/vnpay/return", get(payments::vnpay_return))
        .route(
            "/api/payments/vnpay/ipn",
            get(payments::vnpay_ipn).post(payments::vnpay_ipn_form),
        )
        .route("/api/orders", post(orders::create))
        .route("/api/orders/{id}", get(orders::get))
        .route("/api/orders/{id}/items", post(orders::add_item))
        .route(
            "/api/orders/items/{item_id}",
            patch(orders::update_item_quantity).delete(orders::delete_item),
        )
        .route(
            "/api/orders/items/{item_id}/status",
            patch(orders::update_item_status),
        )
        .route(
            "/api/orders/{id}/voucher",
            post(orders::apply_voucher).delete(orders::remove_voucher),
        )
        .route("/api/orders/{id}/merge", post(orders::merge))
        .route("/api/orders/{id}/status", patch(orders::update_status))
        .route(
            "/api/orders/{id}/kitchen",
            patch(orders::set_kitchen_confirmation),
        )
        .route(
            "/api/orders/{id}/payment/vnpay",
            post(orders::request_gateway_payment),
        )
        .route(
            "/api/orders/{id}/payment/cash",
            post(orders::request_cash_payment),
        )
        .route(
            "/api/orders/{id}/payment/cash/confirm",
            post(orders::confirm_cash_payment),
        )
        .route("/api/tables/{table_id}/order", get(orders::active_for_table))
        .route("/api/tables/{table_id}/items", post(orders::guest_add_item))
        .route(
            "/api/tables/{table_id}/reservations",
            get(reservations::list_for_table),
        )
        .route(
            "/api/table-groups/{group_id}/reservations",
            get(reservations::list_for_group),
        )
        .route("/api/reservations", post(reservations::create))
        .route(
            "/api/reservations/{id}",
            get(reservations::get).patch(reservations::update),
        )
        .route(
            "/api/reservations/{id}/status",
            patch(reservations::update_status),
        )
        .route("/api/reservations/{id}/cancel", post(reservations::cancel))
        .route(
            "/api/reservations/{id}/check-in",
            post(reservations::check_in),
        )
        .route(
            "/api/reservations/{id}/can-modify",
            get(reservations::can_modify),
        )
        .route(
            "/api/reservations/{id}/deposit",
            post(reservations::request_deposit),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
