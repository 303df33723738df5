//! Domain error model.

use serde::Serialize;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Domain-level error.
///
/// Only input failures are decided here. Missing items, duplicate serials and
/// ledger drift are detected by the storage layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input. Detected before any mutation.
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Vec<FieldViolation>,
    },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            details: Vec::new(),
        }
    }

    pub fn field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        let violation = FieldViolation::new(field, msg);
        Self::Validation {
            message: format!("{}: {}", violation.field, violation.message),
            details: vec![violation],
        }
    }

    /// Collapse a list of field violations into a single validation error.
    ///
    /// Returns `Ok(())` when the list is empty.
    pub fn check_fields(details: Vec<FieldViolation>) -> DomainResult<()> {
        if details.is_empty() {
            return Ok(());
        }
        let message = details
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(Self::Validation { message, details })
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn details(&self) -> &[FieldViolation] {
        match self {
            Self::Validation { details, .. } => details,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_fields_passes_when_empty() {
        assert!(DomainError::check_fields(vec![]).is_ok());
    }

    #[test]
    fn check_fields_joins_messages() {
        let err = DomainError::check_fields(vec![
            FieldViolation::new("itemName", "too long"),
            FieldViolation::new("category", "too long"),
        ])
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "validation failed: itemName: too long; category: too long"
        );
        assert_eq!(err.details().len(), 2);
    }

    #[test]
    fn non_validation_errors_have_no_details() {
        assert!(DomainError::invalid_id("ItemId: bad").details().is_empty());
    }
}
