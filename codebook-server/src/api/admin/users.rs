//! User administration
//!
//! Demo accounts can be neither edited nor deleted, and an admin cannot
//! delete their own account.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};
use shared::error::{AppError, ErrorCode};
use shared::models::{ActivityAction, EntityType, PublicUser, User, UserUpdate, normalize_email};

use crate::api::{ApiJson, ApiResult};
use crate::audit::Actor;
use crate::auth::AuthContext;
use crate::db::{self, Condition, StoreError, Update};
use crate::state::AppState;

async fn load(state: &AppState, id: &str) -> Result<User, AppError> {
    db::users::get(state.store.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound).with_detail("user_id", id))
}

/// GET /admin/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<PublicUser>> {
    let users = db::users::list(state.store.as_ref()).await?;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

/// GET /admin/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PublicUser> {
    Ok(Json(PublicUser::from(load(&state, &id).await?)))
}

/// PUT /admin/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UserUpdate>,
) -> ApiResult<PublicUser> {
    let current = load(&state, &id).await?;
    state.demo_accounts.ensure_mutable(&current)?;

    let mut update = Update::new();
    let mut fields: Vec<&str> = Vec::new();

    if let Some(name) = input.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Name must not be empty"));
        }
        update = update.set("name", name);
        fields.push("name");
    }
    if let Some(email) = input.email {
        let email = normalize_email(&email);
        if !email.contains('@') {
            return Err(AppError::validation("A valid email is required"));
        }
        if email != current.email {
            if let Some(other) = db::users::find_by_email(state.store.as_ref(), &email).await?
                && other.id != id
            {
                return Err(AppError::new(ErrorCode::EmailExists));
            }
            update = update.set("email", email);
            fields.push("email");
        }
    }
    if let Some(role) = input.role {
        update = update.set("role", role.as_str());
        fields.push("role");
    }

    if fields.is_empty() {
        return Ok(Json(PublicUser::from(current)));
    }

    let updated = match db::users::update(
        state.store.as_ref(),
        &id,
        update,
        Some(Condition::present("id")),
    )
    .await
    {
        Ok(u) => u,
        Err(StoreError::NotFound | StoreError::Conflict) => {
            return Err(AppError::new(ErrorCode::UserNotFound).with_detail("user_id", id));
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(user_id = %id, fields = ?fields, admin = %ctx.user_id, "User updated");

    state
        .audit
        .record(
            &Actor::from(&ctx),
            ActivityAction::Update,
            EntityType::User,
            &id,
            json!({ "email": updated.email, "updated_fields": fields }),
        )
        .await;
    Ok(Json(PublicUser::from(updated)))
}

/// DELETE /admin/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    if id == ctx.user_id {
        return Err(AppError::new(ErrorCode::CannotDeleteSelf));
    }
    let user = load(&state, &id).await?;
    state.demo_accounts.ensure_mutable(&user)?;

    db::users::delete(state.store.as_ref(), &id).await?;
    tracing::info!(user_id = %id, admin = %ctx.user_id, "User deleted");

    state
        .audit
        .record(
            &Actor::from(&ctx),
            ActivityAction::Delete,
            EntityType::User,
            &id,
            json!({ "email": user.email, "name": user.name }),
        )
        .await;
    Ok(Json(json!({ "deleted": true, "id": id })))
}
