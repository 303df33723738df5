use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use pricetrack_core::ItemId;
use pricetrack_infra::store::Pagination;
use pricetrack_infra::ServiceError;
use pricetrack_inventory::{CreateItemInput, ItemPatchInput, PriceUpdateInput};

use crate::app::dto::{self, DeletedItemResponse, Envelope};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

type ApiResult = Result<Response, ApiError>;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/categories", get(list_categories))
        .route("/id/:id", get(get_item_by_id))
        .route(
            "/serial/:serial",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/serial/:serial/price", post(update_price))
        .route("/serial/:serial/history", get(price_history))
        .route("/serial/:serial/reconcile", post(reconcile_item))
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ListQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let page = Pagination::new(query.page, query.limit)?;
    let items = match query.category.as_deref() {
        Some(category) => services.items.list_by_category(category, page).await?,
        None => services.items.list(page).await?,
    };
    Ok(Envelope::ok(items).respond(StatusCode::OK))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CreateItemInput>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let item = services.items.create(body).await?;
    Ok(Envelope::ok(item)
        .with_message("Item created successfully")
        .respond(StatusCode::CREATED))
}

pub async fn list_categories(Extension(services): Extension<Arc<AppServices>>) -> ApiResult {
    let categories = services.items.categories().await?;
    Ok(Envelope::ok(categories).respond(StatusCode::OK))
}

pub async fn get_item_by_id(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = ItemId::from_str(&id).map_err(|_| ServiceError::item_not_found())?;
    let item = services.items.get_by_id(id).await?;
    Ok(Envelope::ok(item).respond(StatusCode::OK))
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(serial): Path<String>,
) -> ApiResult {
    let item = services.items.get_by_serial(&serial).await?;
    Ok(Envelope::ok(item).respond(StatusCode::OK))
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(serial): Path<String>,
    body: Result<Json<ItemPatchInput>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let item = services.items.update_details(&serial, body).await?;
    Ok(Envelope::ok(item)
        .with_message("Item updated successfully")
        .respond(StatusCode::OK))
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(serial): Path<String>,
) -> ApiResult {
    let deleted = services.items.delete(&serial).await?;
    let body = DeletedItemResponse {
        item: deleted.item,
        history_removed: deleted.history_removed,
    };
    Ok(Envelope::ok(body)
        .with_message("Item deleted successfully")
        .respond(StatusCode::OK))
}

pub async fn update_price(
    Extension(services): Extension<Arc<AppServices>>,
    Path(serial): Path<String>,
    body: Result<Json<PriceUpdateInput>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let updated = services.prices.update_price(&serial, body).await?;
    Ok(Envelope::ok(updated.item)
        .with_message("Price updated successfully")
        .respond(StatusCode::OK))
}

pub async fn price_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(serial): Path<String>,
) -> ApiResult {
    let history = services.items.history(&serial).await?;
    Ok(Envelope::ok(history).respond(StatusCode::OK))
}

pub async fn reconcile_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(serial): Path<String>,
) -> ApiResult {
    let outcome = services.prices.reconcile(&serial).await?;
    Ok(Envelope::ok(outcome).respond(StatusCode::OK))
}
