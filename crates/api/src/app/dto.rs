use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use pricetrack_core::FieldViolation;
use pricetrack_infra::store::DateRange;
use pricetrack_inventory::{ActivitySummary, Item, PriceTrend};

/// Uniform response body: `{success, data?, error?, message?, details?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldViolation>,
}

impl<T> Envelope<T> {
    pub fn failure(
        error: impl Into<String>,
        message: Option<String>,
        details: Vec<FieldViolation>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message,
            details,
        }
    }
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            details: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn respond(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub category: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendQuery {
    pub serial: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTrendResponse {
    pub serial_number: String,
    pub days: i64,
    #[serde(flatten)]
    pub trend: PriceTrend,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeActivityResponse {
    pub date_range: DateRange,
    #[serde(flatten)]
    pub activity: ActivitySummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedItemResponse {
    pub item: Item,
    pub history_removed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_omits_empty_fields() {
        let ok = serde_json::to_value(Envelope::ok(1).with_message("done")).unwrap();
        assert_eq!(ok, json!({"success": true, "data": 1, "message": "done"}));

        let failed = serde_json::to_value(Envelope::<()>::failure(
            "Validation failed",
            None,
            vec![FieldViolation::new("q", "query is required")],
        ))
        .unwrap();
        assert_eq!(
            failed,
            json!({
                "success": false,
                "error": "Validation failed",
                "details": [{"field": "q", "message": "query is required"}]
            })
        );
    }
}
