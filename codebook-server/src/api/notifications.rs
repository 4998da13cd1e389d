//! Notification badge
//!
//! Customers count their orders updated since they last looked; admins
//! count every order placed since then.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use shared::error::{AppError, ErrorCode};

use crate::auth::AuthContext;
use crate::db::{self, StoreError};
use crate::state::AppState;

use super::ApiResult;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCount {
    pub count: usize,
    pub order_count: usize,
    /// Support tickets are not tracked; always 0
    pub ticket_count: usize,
    pub notifications_read_at: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRead {
    pub notifications_read_at: i64,
}

/// GET /notifications/count
pub async fn count(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> ApiResult<NotificationCount> {
    let user = db::users::get(state.store.as_ref(), &ctx.user_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;
    let since = user.notifications_read_at.unwrap_or(0);

    let orders = if ctx.is_admin() {
        db::orders::created_since(state.store.as_ref(), since).await?
    } else {
        db::orders::updated_since(state.store.as_ref(), Some(ctx.user_id.as_str()), since)
            .await?
    };

    let order_count = orders.len();
    let ticket_count = 0;
    Ok(Json(NotificationCount {
        count: order_count + ticket_count,
        order_count,
        ticket_count,
        notifications_read_at: user.notifications_read_at,
    }))
}

/// POST /notifications/mark-read
pub async fn mark_read(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> ApiResult<MarkedRead> {
    let now = shared::util::now_millis();
    let store = state.store.as_ref();
    let read_at = match db::users::mark_notifications_read(store, &ctx.user_id, now).await {
        Ok(t) => t,
        Err(StoreError::NotFound) => return Err(AppError::new(ErrorCode::UserNotFound)),
        Err(e) => return Err(e.into()),
    };
    Ok(Json(MarkedRead {
        notifications_read_at: read_at,
    }))
}
