//! Request extractors for the caller's identity and address.
//!
//! Authentication happens upstream; by the time a request reaches this
//! service the auth layer has set `x-user-id` and `x-user-role`. Requests
//! without them are walk-in guests.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{UserId, UserRole};
use domain::Actor;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The actor a request runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub Actor);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers).map(Identity)
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let Some(raw_id) = header(headers, USER_ID_HEADER) else {
        return Ok(Actor::Guest);
    };
    let id: UserId = raw_id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid {USER_ID_HEADER}: {e}")))?;
    let role = match header(headers, USER_ROLE_HEADER) {
        Some(raw) => raw
            .parse::<UserRole>()
            .map_err(|e| ApiError::BadRequest(format!("invalid {USER_ROLE_HEADER}: {e}")))?,
        None => UserRole::Customer,
    };
    Ok(Actor::User { id, role })
}

/// Address of the paying client, as forwarded by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = header(&parts.headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| header(&parts.headers, "x-real-ip"))
            .unwrap_or("127.0.0.1");
        Ok(ClientIp(ip.to_string()))
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
