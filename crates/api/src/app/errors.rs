use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use pricetrack_core::DomainError;
use pricetrack_infra::ServiceError;

use crate::app::dto::Envelope;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Request could not be decoded (bad JSON, bad query string).
    #[error("{0}")]
    BadRequest(String),
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        ApiError::Service(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::BadRequest(msg) => {
                return json_error(StatusCode::BAD_REQUEST, "Validation failed", Some(msg), Vec::new());
            }
            ApiError::Service(err) => err,
        };

        match err {
            ServiceError::Validation { message, details } => {
                json_error(StatusCode::BAD_REQUEST, "Validation failed", Some(message), details)
            }
            ServiceError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, msg, None, Vec::new()),
            ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, msg, None, Vec::new()),
            ServiceError::Consistency(msg) => {
                error!(reason = %msg, "price ledger consistency failure");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Price consistency check failed",
                    None,
                    Vec::new(),
                )
            }
            other @ (ServiceError::Transient(_) | ServiceError::Store(_)) => {
                error!(error = %other, "store failure");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                    Vec::new(),
                )
            }
        }
    }
}

pub fn json_error(
    status: StatusCode,
    error: impl Into<String>,
    message: Option<String>,
    details: Vec<pricetrack_core::FieldViolation>,
) -> Response {
    (status, axum::Json(Envelope::<()>::failure(error, message, details))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricetrack_infra::store::StoreError;

    fn status(err: ServiceError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn service_errors_map_to_statuses() {
        assert_eq!(
            status(DomainError::field("q", "query is required").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(ServiceError::item_not_found()), StatusCode::NOT_FOUND);
        assert_eq!(status(StoreError::Duplicate("SN1".into()).into()), StatusCode::CONFLICT);
        assert_eq!(
            status(ServiceError::Consistency("SN1".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(ServiceError::Transient("timeout".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
