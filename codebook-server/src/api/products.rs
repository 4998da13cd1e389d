//! Public catalog

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{MAX_FEATURED_PRODUCTS, Product};

use crate::db;
use crate::state::AppState;

use super::ApiResult;

#[derive(Deserialize)]
pub struct ProductQuery {
    pub name_like: Option<String>,
}

/// GET /products?name_like=
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Vec<Product>> {
    let products = db::products::list(state.store.as_ref(), query.name_like.as_deref()).await?;
    Ok(Json(products))
}

/// GET /products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Product> {
    db::products::get(state.store.as_ref(), &id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound).with_detail("product_id", id))
}

/// GET /featured-products
pub async fn featured_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    let mut featured = db::products::featured(state.store.as_ref()).await?;
    featured.sort_by(|a, b| a.name.cmp(&b.name));
    featured.truncate(MAX_FEATURED_PRODUCTS);
    Ok(Json(featured))
}
