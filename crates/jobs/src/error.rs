use domain::DomainError;
use store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, JobError>;
