use thiserror::Error;

/// Errors raised while signing or verifying gateway messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The merchant secret is not configured.
    #[error("gateway hash secret is not configured")]
    MissingSecret,

    /// A required callback field was absent.
    #[error("missing callback field: {0}")]
    MissingField(&'static str),

    /// The callback signature did not match.
    #[error("invalid callback signature")]
    InvalidSignature,

    /// The transaction reference does not follow a known format.
    #[error("unrecognized transaction reference: {0}")]
    UnrecognizedReference(String),

    /// The amount cannot be represented by the gateway.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
