use thiserror::Error;

use common::ParseStatusError;

/// Errors that can occur when reading or writing persisted records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An update targeted a row that does not exist.
    #[error("{entity} not found: {id}")]
    Missing { entity: &'static str, id: String },

    /// A uniqueness constraint was violated.
    #[error("duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    /// A stored value could not be mapped back onto a domain type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ParseStatusError> for StoreError {
    fn from(err: ParseStatusError) -> Self {
        StoreError::Decode(err.to_string())
    }
}

impl StoreError {
    pub(crate) fn missing(entity: &'static str, id: impl ToString) -> Self {
        StoreError::Missing {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
