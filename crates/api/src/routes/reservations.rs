//! Reservation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ReservationId, ReservationStatus, ResourceRef, TableGroupId, TableId};
use domain::{CreateReservation, PaymentLink, ReservationCreated, ReservationView, UpdateReservation};
use serde::{Deserialize, Serialize};
use store::Reservation;

use crate::error::ApiError;
use crate::identity::{ClientIp, Identity};
use crate::state::AppState;

type Shared = State<Arc<AppState>>;

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: ReservationStatus,
}

#[derive(Deserialize, Default)]
pub struct DepositRequest {
    #[serde(default)]
    pub bank_code: Option<String>,
}

#[derive(Serialize)]
pub struct CanModifyResponse {
    pub reservation_id: ReservationId,
    pub can_modify: bool,
}

/// POST /api/reservations
///
/// Responds 201 whether the reservation was confirmed straight away or is
/// waiting on a deposit; `requires_payment` tells the two apart.
#[tracing::instrument(skip(state, cmd))]
pub async fn create(
    State(state): Shared,
    Identity(actor): Identity,
    ClientIp(client_ip): ClientIp,
    Json(mut cmd): Json<CreateReservation>,
) -> Result<(StatusCode, Json<ReservationCreated>), ApiError> {
    if cmd.client_ip.is_empty() {
        cmd.client_ip = client_ip;
    }
    let created = state
        .engines
        .reservations
        .create_reservation(&actor, cmd)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/reservations/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<ReservationId>,
) -> Result<Json<ReservationView>, ApiError> {
    Ok(Json(
        state.engines.reservations.get_reservation(&actor, id).await?,
    ))
}

/// PATCH /api/reservations/{id}
#[tracing::instrument(skip(state, cmd))]
pub async fn update(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<ReservationId>,
    Json(cmd): Json<UpdateReservation>,
) -> Result<Json<ReservationView>, ApiError> {
    Ok(Json(
        state
            .engines
            .reservations
            .update_reservation(&actor, id, cmd)
            .await?,
    ))
}

/// PATCH /api/reservations/{id}/status: staff only.
#[tracing::instrument(skip(state, req))]
pub async fn update_status(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<ReservationId>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ReservationView>, ApiError> {
    Ok(Json(
        state
            .engines
            .reservations
            .update_status(&actor, id, req.status)
            .await?,
    ))
}

/// POST /api/reservations/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<ReservationId>,
) -> Result<Json<ReservationView>, ApiError> {
    Ok(Json(state.engines.reservations.cancel(&actor, id).await?))
}

/// POST /api/reservations/{id}/check-in
#[tracing::instrument(skip(state))]
pub async fn check_in(
    State(state): Shared,
    Identity(actor): Identity,
    Path(id): Path<ReservationId>,
) -> Result<Json<ReservationView>, ApiError> {
    Ok(Json(state.engines.reservations.check_in(&actor, id).await?))
}

/// GET /api/reservations/{id}/can-modify
#[tracing::instrument(skip(state))]
pub async fn can_modify(
    State(state): Shared,
    Path(id): Path<ReservationId>,
) -> Result<Json<CanModifyResponse>, ApiError> {
    let can_modify = state.engines.reservations.can_modify(id).await?;
    Ok(Json(CanModifyResponse {
        reservation_id: id,
        can_modify,
    }))
}

/// POST /api/reservations/{id}/deposit: a fresh link after a failed deposit.
#[tracing::instrument(skip(state, req))]
pub async fn request_deposit(
    State(state): Shared,
    Identity(actor): Identity,
    ClientIp(client_ip): ClientIp,
    Path(id): Path<ReservationId>,
    req: Option<Json<DepositRequest>>,
) -> Result<Json<PaymentLink>, ApiError> {
    let Json(req) = req.unwrap_or_default();
    Ok(Json(
        state
            .engines
            .reservations
            .request_deposit_payment(&actor, id, &client_ip, req.bank_code)
            .await?,
    ))
}

/// GET /api/tables/{table_id}/reservations: staff only.
#[tracing::instrument(skip(state))]
pub async fn list_for_table(
    State(state): Shared,
    Identity(actor): Identity,
    Path(table_id): Path<TableId>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    list(&state, &actor, ResourceRef::Table(table_id)).await
}

/// GET /api/table-groups/{group_id}/reservations: staff only.
#[tracing::instrument(skip(state))]
pub async fn list_for_group(
    State(state): Shared,
    Identity(actor): Identity,
    Path(group_id): Path<TableGroupId>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    list(&state, &actor, ResourceRef::TableGroup(group_id)).await
}

async fn list(
    state: &AppState,
    actor: &domain::Actor,
    resource: ResourceRef,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    Ok(Json(
        state
            .engines
            .reservations
            .list_for_resource(actor, resource)
            .await?,
    ))
}
