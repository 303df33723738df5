//! Errors returned by the item, price, analytics and search services.

use thiserror::Error;

use pricetrack_core::{DomainError, FieldViolation};

use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Malformed or out-of-range input. Nothing was written.
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldViolation>,
    },

    #[error("{0}")]
    NotFound(String),

    /// Duplicate serial on create.
    #[error("{0}")]
    Conflict(String),

    /// An item's current price disagrees with its newest ledger record.
    #[error("consistency violation: {0}")]
    Consistency(String),

    /// Timeout, lost connection or contention that outlived the retry budget.
    #[error("store temporarily unavailable: {0}")]
    Transient(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl ServiceError {
    pub fn item_not_found() -> Self {
        ServiceError::NotFound("Item not found".to_string())
    }

    pub fn details(&self) -> &[FieldViolation] {
        match self {
            ServiceError::Validation { details, .. } => details,
            _ => &[],
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation { message, details } => {
                ServiceError::Validation { message, details }
            }
            DomainError::InvalidId(msg) => ServiceError::Validation {
                message: msg,
                details: Vec::new(),
            },
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(_) => ServiceError::item_not_found(),
            StoreError::Duplicate(_) => {
                ServiceError::Conflict("Item with this serial number already exists".to_string())
            }
            StoreError::Concurrency(msg) | StoreError::Timeout(msg) | StoreError::Unavailable(msg) => {
                ServiceError::Transient(msg)
            }
            StoreError::Backend(_) => ServiceError::Store(value),
        }
    }
}
