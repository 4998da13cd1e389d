//! Admin API (admin role required for every route)

pub mod activity;
pub mod orders;
pub mod products;
pub mod users;

use axum::Router;
use axum::routing::{get, post, put};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/admin/products/{id}",
            get(crate::api::products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/admin/orders", get(orders::list_orders))
        .route("/admin/orders/{id}", get(orders::get_order))
        .route("/admin/orders/{id}/status", put(orders::update_status))
        .route("/admin/orders/{id}/refund", post(orders::refund))
        .route("/admin/orders/{id}/tracking", post(orders::attach_tracking))
        .route(
            "/admin/orders/{id}/generate-label",
            post(orders::generate_label),
        )
        .route("/admin/users", get(users::list_users))
        .route(
            "/admin/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/admin/activity-logs", get(activity::list_activity))
}
