//! Bearer authentication for route groups and handlers

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use shared::error::AppError;

use super::AuthContext;
use crate::state::AppState;

fn bearer_token(headers: &http::HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(AppError::not_authenticated)?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::invalid_token("Invalid Authorization format"))
}

fn authenticate(headers: &http::HeaderMap, state: &AppState) -> Result<AuthContext, AppError> {
    let token = bearer_token(headers)?;
    state.jwt.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        AppError::from(e)
    })
}

/// Verify the bearer token and attach the [`AuthContext`] to the request
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = authenticate(request.headers(), &state)?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Reject non-admin callers; layered inside [`require_auth`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let ctx = request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(AppError::not_authenticated)?;
    if let Err(e) = ctx.require_admin() {
        tracing::warn!(user_id = %ctx.user_id, "Non-admin request to admin route");
        return Err(e);
    }
    Ok(next.run(request).await)
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(ctx.clone());
        }
        authenticate(&parts.headers, state)
    }
}
