//! Self-service user lookup

use axum::Json;
use axum::extract::{Path, State};
use shared::error::{AppError, ErrorCode};
use shared::models::PublicUser;

use crate::auth::AuthContext;
use crate::db;
use crate::state::AppState;

use super::ApiResult;

/// GET /users/{id} (self or admin)
pub async fn get_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<PublicUser> {
    ctx.require_self_or_admin(&id)?;
    let user = db::users::get(state.store.as_ref(), &id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;
    Ok(Json(PublicUser::from(user)))
}
