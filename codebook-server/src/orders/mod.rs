//! Order lifecycle
//!
//! [`OrderService`] validates carts, reserves stock, persists orders and
//! drives the status machine (see [`OrderStatus::can_transition_to`]).
//! Every transition is a conditional update keyed on the status it was
//! loaded with; stock restoration, audit and email run only after that
//! write lands.

mod service;
pub mod validate;

use serde::Deserialize;
use shared::error::AppError;
use shared::models::{CartItem, OrderStatus};
use thiserror::Error;

use crate::db::StoreError;
use crate::services::StockError;
use crate::shipping::{Address, Parcel, ShippingError};
use crate::stripe::PaymentError;

pub use service::OrderService;

/// `POST /orders` body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub cart_list: Vec<CartItem>,
    pub amount_paid: f64,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub user: Option<DeclaredUser>,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

/// User the client claims to order for; must be the caller
#[derive(Debug, Clone, Deserialize)]
pub struct DeclaredUser {
    #[serde(default)]
    pub id: Option<String>,
}

/// Tracking fields written together with a `shipped` transition
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Tracking {
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub tracking_carrier: Option<String>,
    #[serde(default)]
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub label_url: Option<String>,
}

impl Tracking {
    fn is_empty(&self) -> bool {
        self.tracking_number.is_none()
            && self.tracking_carrier.is_none()
            && self.tracking_url.is_none()
            && self.label_url.is_none()
    }
}

/// `POST /admin/orders/{id}/tracking` body
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingUpdate {
    pub tracking_number: String,
    pub tracking_carrier: String,
    #[serde(default)]
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub label_url: Option<String>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

/// `POST /admin/orders/{id}/refund` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefundInput {
    /// Currency units; `None` refunds everything
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /admin/orders/{id}/generate-label` body
#[derive(Debug, Clone, Deserialize)]
pub struct LabelInput {
    pub address_from: Address,
    pub address_to: Address,
    pub parcel: Parcel,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("{0}")]
    Validation(String),
    #[error("amount_paid {actual} does not match cart total {expected}")]
    AmountMismatch { expected: f64, actual: f64 },
    #[error("order user does not match the caller")]
    IdentityMismatch,
    #[error("order {0} not found")]
    NotFound(String),
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("refunds must use the refund operation")]
    RefundViaStatus,
    #[error("order {order_id} was changed concurrently")]
    StatusConflict {
        order_id: String,
        refund_id: Option<String>,
    },
    #[error("order {0} is already refunded")]
    AlreadyRefunded(String),
    #[error("order {0} has no payment intent")]
    NoPaymentIntent(String),
    #[error("payment {intent_id} has status {status}")]
    PaymentNotSucceeded { intent_id: String, status: String },
    #[error("order write failed: {source}")]
    PersistFailed {
        payment_intent_id: Option<String>,
        source: StoreError,
    },
    #[error(transparent)]
    Auth(AppError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Stock(#[from] StockError),
    #[error(transparent)]
    Shipping(#[from] ShippingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type OrderResult<T> = Result<T, OrderError>;

#[cfg(test)]
mod tests;
