//! Catalog administration

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};
use shared::error::AppError;
use shared::models::{Product, ProductCreate, ProductUpdate};

use crate::api::{ApiJson, ApiResult};
use crate::audit::Actor;
use crate::auth::AuthContext;
use crate::db;
use crate::state::AppState;

/// GET /admin/products
pub async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    Ok(Json(db::products::list(state.store.as_ref(), None).await?))
}

/// POST /admin/products
pub async fn create_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    ApiJson(input): ApiJson<ProductCreate>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = state.catalog.create(&Actor::from(&ctx), input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /admin/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ProductUpdate>,
) -> ApiResult<Product> {
    let product = state.catalog.update(&Actor::from(&ctx), &id, input).await?;
    Ok(Json(product))
}

/// DELETE /admin/products/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    state.catalog.delete(&Actor::from(&ctx), &id).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}
