//! HTTP API
//!
//! Route groups: public (catalog, auth, webhook), authenticated (orders,
//! payments, notifications) and admin. Every failure is an [`AppError`]
//! rendered as `{error, code, details?}`.

pub mod admin;
pub mod auth;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod payment;
pub mod products;
pub mod users;


use axum::extract::{FromRequest, Request};
use axum::http::{Method, header};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde::de::DeserializeOwned;
use shared::error::AppError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::middleware::require_admin;
use crate::auth::rate_limit::{login_rate_limit, register_rate_limit};
use crate::auth::require_auth;
use crate::state::AppState;

pub type ApiResult<T> = Result<Json<T>, AppError>;

/// JSON body whose rejections use the error envelope
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, AppError> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::validation(rejection.body_text())),
        }
    }
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Catalog and webhook (no auth)
    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/products", get(products::list_products))
        .route("/products/{id}", get(products::get_product))
        .route("/featured-products", get(products::featured_products))
        .route("/payment/webhook", post(payment::webhook));

    let login = Router::new()
        .route("/login", post(auth::login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login_rate_limit,
        ));
    let register = Router::new()
        .route("/register", post(auth::register))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            register_rate_limit,
        ));

    let authenticated = Router::new()
        .route("/users/{id}", get(users::get_user))
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/{id}", get(orders::get_order))
        .route("/payment/create-intent", post(payment::create_intent))
        .route("/payment/verify/{intent_id}", get(payment::verify))
        .route("/notifications/count", get(notifications::count))
        .route("/notifications/mark-read", post(notifications::mark_read))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin = admin::router()
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(login)
        .merge(register)
        .merge(authenticated)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}
