//! Domain error types.

use chrono::{DateTime, Utc};
use gateway::GatewayError;
use store::StoreError;
use thiserror::Error;

/// What a conflicting request collided with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictKind {
    /// The requested window overlaps an existing booking.
    #[error("resource is booked from {start} until {end} by {holder}")]
    Overlap {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        holder: String,
    },

    #[error("a voucher is already applied to this order")]
    VoucherAlreadyApplied,

    #[error("voucher usage limit reached")]
    VoucherExhausted,

    #[error("paid orders cannot be merged")]
    MergePaidOrder,

    #[error("an order cannot be merged into itself")]
    MergeIntoSelf,

    #[error("payment already completed")]
    PaymentAlreadyCompleted,
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(ConflictKind),

    /// The entity's current status does not allow the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("invalid gateway signature")]
    GatewaySignatureInvalid,

    #[error("gateway error: {0}")]
    Gateway(GatewayError),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        DomainError::InvalidState(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::ValidationFailed(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        DomainError::Forbidden(message.into())
    }

    /// HTTP-style status code for the boundary layer.
    pub fn status_code(&self) -> u16 {
        match self {
            DomainError::NotFound { .. } => 404,
            DomainError::Conflict(_) => 409,
            DomainError::InvalidState(_) => 422,
            DomainError::ValidationFailed(_) => 400,
            DomainError::Forbidden(_) => 403,
            DomainError::Unauthorized => 401,
            DomainError::GatewaySignatureInvalid => 400,
            DomainError::Gateway(GatewayError::UnrecognizedReference(_))
            | DomainError::Gateway(GatewayError::MissingField(_))
            | DomainError::Gateway(GatewayError::InvalidAmount(_)) => 400,
            DomainError::Gateway(_) | DomainError::Store(_) => 500,
        }
    }

    /// Returns true for errors whose details must not reach clients.
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing { entity, id } => DomainError::NotFound { entity, id },
            other => DomainError::Store(other),
        }
    }
}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidSignature => DomainError::GatewaySignatureInvalid,
            other => DomainError::Gateway(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
