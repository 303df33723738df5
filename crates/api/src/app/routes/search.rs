use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};

use pricetrack_infra::store::Pagination;

use crate::app::dto::{self, Envelope};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(search_items))
        .route("/suggestions", get(suggestions))
        .route("/categories", get(category_counts))
        .route("/volatile", get(most_volatile))
        .route("/recent-changes", get(recent_changes))
}

pub async fn search_items(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::SearchQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let page = Pagination::new(query.page, query.limit)?;
    let found = services
        .search
        .search(&query.q, query.category.as_deref(), page)
        .await?;
    Ok(Envelope::ok(found).respond(StatusCode::OK))
}

pub async fn suggestions(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::SuggestionQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let hits = services.search.suggestions(&query.q).await?;
    Ok(Envelope::ok(hits).respond(StatusCode::OK))
}

pub async fn category_counts(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let counts = services.search.category_counts().await?;
    Ok(Envelope::ok(counts).respond(StatusCode::OK))
}

pub async fn most_volatile(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::LimitQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let items = services.analytics.most_volatile_items(query.limit).await?;
    Ok(Envelope::ok(items).respond(StatusCode::OK))
}

pub async fn recent_changes(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::LimitQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let changes = services.analytics.recent_changes(query.limit).await?;
    Ok(Envelope::ok(changes).respond(StatusCode::OK))
}
