use axum::{http::StatusCode, response::Response, Json};
use chrono::Utc;
use serde_json::json;

use crate::app::errors;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn not_found() -> Response {
    errors::json_error(StatusCode::NOT_FOUND, "Route not found", None, Vec::new())
}
