//! Customer order endpoints

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{Order, OrderResponse};

use crate::auth::AuthContext;
use crate::db;
use crate::orders::CreateOrderRequest;
use crate::state::AppState;

use super::{ApiJson, ApiResult};

#[derive(Deserialize)]
pub struct OrderQuery {
    #[serde(rename = "user.id")]
    pub user_id: Option<String>,
}

/// GET /orders?user.id= (defaults to the caller)
pub async fn list_orders(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Vec<Order>> {
    let user_id = query.user_id.unwrap_or_else(|| ctx.user_id.clone());
    ctx.require_self_or_admin(&user_id)?;
    let orders = db::orders::list_for_user(state.store.as_ref(), &user_id).await?;
    Ok(Json(orders))
}

/// GET /orders/{id} (owner or admin)
pub async fn get_order(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    let order = db::orders::get(state.store.as_ref(), &id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", id))?;
    ctx.require_self_or_admin(&order.user_id)?;
    Ok(Json(order))
}

/// POST /orders
pub async fn create_order(
    State(state): State<AppState>,
    ctx: AuthContext,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let created = state.orders.create_order(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
