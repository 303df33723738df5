use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};

use pricetrack_core::SerialNumber;
use pricetrack_infra::analytics::DEFAULT_TREND_DAYS;
use pricetrack_infra::store::DateRange;

use crate::app::dto::{self, DateRangeActivityResponse, Envelope, ItemTrendResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/summary", get(summary))
        .route("/price-trends", get(price_trends))
        .route("/today", get(today))
        .route("/date-range", get(date_range))
}

pub async fn summary(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, ApiError> {
    let stats = services.analytics.price_stats().await?;
    Ok(Envelope::ok(stats).respond(StatusCode::OK))
}

/// Per-item trend when `serial` is given, market-wide movement otherwise.
pub async fn price_trends(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::TrendQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS);

    match query.serial.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(serial) => {
            let trend = services.analytics.price_trend(serial, days).await?;
            let serial_number = SerialNumber::lookup(serial)
                .map(String::from)
                .unwrap_or_else(|| serial.to_string());
            let body = ItemTrendResponse {
                serial_number,
                days,
                trend,
            };
            Ok(Envelope::ok(body).respond(StatusCode::OK))
        }
        None => {
            let overall = services.analytics.overall_trend().await?;
            Ok(Envelope::ok(overall).respond(StatusCode::OK))
        }
    }
}

pub async fn today(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, ApiError> {
    let activity = services.analytics.todays_activity().await?;
    Ok(Envelope::ok(activity).respond(StatusCode::OK))
}

pub async fn date_range(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::DateRangeQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let range = DateRange::parse(&query.start, &query.end)?;
    let activity = services.analytics.date_range_activity(range).await?;
    let body = DateRangeActivityResponse {
        date_range: range,
        activity,
    };
    Ok(Envelope::ok(body).respond(StatusCode::OK))
}
