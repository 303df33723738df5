use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::Router;

use crate::app::errors::ApiError;

pub mod analytics;
pub mod items;
pub mod search;
pub mod system;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .nest("/items", items::router())
        .nest("/search", search::router())
        .nest("/analytics", analytics::router())
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}
