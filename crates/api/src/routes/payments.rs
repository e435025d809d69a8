//! Gateway callback endpoints.
//!
//! The browser return and the server-to-server IPN carry the same signed
//! parameters and go through the same reconciliation; they only differ in
//! how the outcome is reported back.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use domain::{ipn_response, return_redirect_url};
use gateway::{CallbackParams, IpnResponse};

use crate::state::AppState;

/// GET /api/payments/vnpay/return: 302 to the client's result page.
#[tracing::instrument(skip_all)]
pub async fn vnpay_return(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let result = state.engines.payments.handle_callback(&params).await;
    let location = return_redirect_url(&state.client_url, &result);
    (StatusCode::FOUND, [(header::LOCATION, location)])
}

/// GET /api/payments/vnpay/ipn: acknowledgement body for the gateway.
///
/// Always answers 200; the gateway reads `RspCode` to decide on retries.
#[tracing::instrument(skip_all)]
pub async fn vnpay_ipn(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Json<IpnResponse> {
    acknowledge(&state, &params).await
}

/// POST /api/payments/vnpay/ipn: same as GET, with the parameters in a
/// form-encoded body. Falls back to the query string when there is no form.
#[tracing::instrument(skip_all)]
pub async fn vnpay_ipn_form(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackParams>,
    form: Result<Form<CallbackParams>, FormRejection>,
) -> Json<IpnResponse> {
    let params = match form {
        Ok(Form(body)) if !body.is_empty() => body,
        _ => query,
    };
    acknowledge(&state, &params).await
}

async fn acknowledge(state: &AppState, params: &CallbackParams) -> Json<IpnResponse> {
    let result = state.engines.payments.handle_callback(params).await;
    Json(ipn_response(&result))
}
