//! Login and registration

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{PublicUser, User, UserRole, normalize_email};

use crate::db::{self, StoreError};
use crate::state::AppState;
use crate::util::{hash_password, verify_password};

use super::{ApiJson, ApiResult};

pub const MIN_PASSWORD_LEN: usize = 8;

/// POST /login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /register
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: PublicUser,
}

fn issue(state: &AppState, user: &User) -> Result<AuthResponse, AppError> {
    let access_token = state.jwt.create_token(user).map_err(|e| {
        tracing::error!("JWT creation failed: {e}");
        AppError::from(e)
    })?;
    Ok(AuthResponse {
        access_token,
        user: PublicUser::from(user),
    })
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let email = normalize_email(&req.email);
    // Same error for unknown email and wrong password
    let user = db::users::find_by_email(state.store.as_ref(), &email)
        .await?
        .ok_or_else(AppError::invalid_credentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "Login rejected");
        return Err(AppError::invalid_credentials());
    }

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(Json(issue(&state, &user)?))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let email = normalize_email(&req.email);
    if !email.contains('@') {
        return Err(AppError::validation("A valid email is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }

    if db::users::find_by_email(state.store.as_ref(), &email)
        .await?
        .is_some()
    {
        return Err(AppError::new(ErrorCode::EmailExists));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("Password hashing failed: {e}");
        AppError::internal("Password hashing failed")
    })?;
    let user = User {
        id: shared::util::new_id(),
        email,
        name: name.to_string(),
        password_hash,
        role: UserRole::User,
        created_at: shared::util::now_millis(),
        notifications_read_at: None,
    };
    match db::users::create(state.store.as_ref(), &user).await {
        Ok(()) => {}
        Err(StoreError::Conflict) => return Err(AppError::new(ErrorCode::EmailExists)),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(issue(&state, &user)?)))
}
