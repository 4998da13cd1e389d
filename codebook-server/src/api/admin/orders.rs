//! Order administration: status machine, refunds, tracking, labels

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{Order, OrderResponse, OrderStatus};

use crate::api::{ApiJson, ApiResult};
use crate::auth::AuthContext;
use crate::db;
use crate::orders::{LabelInput, RefundInput, Tracking, TrackingUpdate};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AdminOrderQuery {
    pub status: Option<String>,
}

/// `PUT /admin/orders/{id}/status` body
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
    #[serde(flatten)]
    pub tracking: Tracking,
}

/// GET /admin/orders[?status=]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<AdminOrderQuery>,
) -> ApiResult<Vec<Order>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<OrderStatus>()
                .map_err(|_| AppError::validation(format!("Unknown order status: {s}")))
        })
        .transpose()?;
    Ok(Json(db::orders::list_all(state.store.as_ref(), status).await?))
}

/// GET /admin/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    db::orders::get(state.store.as_ref(), &id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", id))
}

/// PUT /admin/orders/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> ApiResult<OrderResponse> {
    let updated = state
        .orders
        .update_status(&ctx, &id, req.status, Some(req.tracking))
        .await?;
    Ok(Json(updated))
}

/// POST /admin/orders/{id}/refund
pub async fn refund(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<OrderResponse> {
    // Empty body is a full refund
    let input: RefundInput = if body.iter().all(u8::is_ascii_whitespace) {
        RefundInput::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::validation(format!("Invalid refund request: {e}")))?
    };
    Ok(Json(state.orders.refund(&ctx, &id, input).await?))
}

/// POST /admin/orders/{id}/tracking
pub async fn attach_tracking(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<TrackingUpdate>,
) -> ApiResult<OrderResponse> {
    Ok(Json(state.orders.attach_tracking(&ctx, &id, input).await?))
}

/// POST /admin/orders/{id}/generate-label
pub async fn generate_label(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<LabelInput>,
) -> ApiResult<OrderResponse> {
    Ok(Json(state.orders.generate_label(&ctx, &id, input).await?))
}
