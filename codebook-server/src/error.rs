//! Subsystem errors → API error
//!
//! Each subsystem keeps its own `thiserror` enum; these conversions let
//! handlers and services use `?` and end up with the right `ErrorCode`.
//! Infrastructure failures are logged here, with the client seeing only the
//! code (and, for 500s, a correlation id added by the error envelope).

use shared::error::{AppError, ErrorCode};

use crate::auth::JwtError;
use crate::db::StoreError;
use crate::orders::OrderError;
use crate::services::StockError;
use crate::shipping::ShippingError;
use crate::stripe::PaymentError;

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AppError::new(ErrorCode::NotFound),
            StoreError::Conflict => AppError::new(ErrorCode::Conflict),
            StoreError::Throttled(msg) => {
                tracing::warn!(error = %msg, "Store throttled");
                AppError::new(ErrorCode::Throttled)
            }
            StoreError::Unavailable(msg) => {
                tracing::error!(error = %msg, "Store unavailable");
                AppError::new(ErrorCode::ServiceUnavailable)
            }
            StoreError::Serialization(msg) => {
                AppError::with_message(ErrorCode::DatabaseError, msg)
            }
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        tracing::warn!(error = %e, "Payment gateway error");
        match e {
            PaymentError::Declined(msg) | PaymentError::InvalidRequest(msg) => {
                AppError::with_message(ErrorCode::PaymentFailed, msg)
            }
            PaymentError::NotFound(id) => {
                AppError::new(ErrorCode::PaymentNotFound).with_detail("intent_id", id)
            }
            PaymentError::RateLimited => AppError::new(ErrorCode::Throttled),
            PaymentError::Unavailable(_) => AppError::new(ErrorCode::PaymentProviderUnavailable),
        }
    }
}

impl From<StockError> for AppError {
    fn from(e: StockError) -> Self {
        match e {
            StockError::Insufficient { product_id } => AppError::with_message(
                ErrorCode::InsufficientStock,
                format!("Insufficient stock for product {product_id}"),
            )
            .with_detail("product_id", product_id),
            StockError::ProductNotFound(id) => {
                AppError::new(ErrorCode::ProductNotFound).with_detail("product_id", id)
            }
            StockError::Store(e) => e.into(),
        }
    }
}

impl From<ShippingError> for AppError {
    fn from(e: ShippingError) -> Self {
        tracing::warn!(error = %e, "Shipping provider error");
        AppError::with_message(ErrorCode::ShippingProviderError, e.to_string())
    }
}

impl From<JwtError> for AppError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Expired => AppError::token_expired(),
            JwtError::Invalid(_) => AppError::new(ErrorCode::TokenInvalid),
            JwtError::Encode(msg) => AppError::with_message(ErrorCode::InternalError, msg),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::EmptyCart => AppError::new(ErrorCode::OrderEmpty),
            OrderError::Validation(msg) => AppError::validation(msg),
            OrderError::AmountMismatch { expected, actual } => {
                AppError::new(ErrorCode::AmountMismatch)
                    .with_detail("expected", expected)
                    .with_detail("actual", actual)
            }
            OrderError::IdentityMismatch => AppError::new(ErrorCode::IdentityMismatch),
            OrderError::NotFound(id) => {
                AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", id)
            }
            OrderError::InvalidTransition { from, to } => AppError::with_message(
                ErrorCode::InvalidTransition,
                format!("Cannot move order from {from} to {to}"),
            )
            .with_detail("from", from.as_str())
            .with_detail("to", to.as_str()),
            OrderError::RefundViaStatus => AppError::invalid_request(
                "Refunds go through POST /admin/orders/{id}/refund",
            ),
            OrderError::StatusConflict {
                order_id,
                refund_id,
            } => {
                let err = AppError::new(ErrorCode::StatusConflict).with_detail("order_id", order_id);
                match refund_id {
                    Some(r) => err.with_detail("refund_id", r),
                    None => err,
                }
            }
            OrderError::AlreadyRefunded(id) => {
                AppError::new(ErrorCode::AlreadyRefunded).with_detail("order_id", id)
            }
            OrderError::NoPaymentIntent(id) => {
                AppError::new(ErrorCode::PaymentIntentMissing).with_detail("order_id", id)
            }
            OrderError::PaymentNotSucceeded { intent_id, status } => AppError::with_message(
                ErrorCode::PaymentFailed,
                format!("Payment {intent_id} has status {status}"),
            )
            .with_detail("payment_intent_id", intent_id),
            OrderError::PersistFailed {
                payment_intent_id,
                source,
            } => {
                tracing::error!(
                    payment_intent_id = ?payment_intent_id,
                    error = %source,
                    "Order write failed after stock reservation, needs reconciliation"
                );
                // Id collisions exhausted also land on 503
                let code = match source {
                    StoreError::Throttled(_) => ErrorCode::Throttled,
                    StoreError::Serialization(_) => ErrorCode::DatabaseError,
                    _ => ErrorCode::ServiceUnavailable,
                };
                let err = AppError::with_message(code, "Order could not be saved");
                match payment_intent_id {
                    Some(pi) => err.with_detail("payment_intent_id", pi),
                    None => err,
                }
            }
            OrderError::Auth(e) => e,
            OrderError::Payment(e) => e.into(),
            OrderError::Stock(e) => e.into(),
            OrderError::Shipping(e) => e.into(),
            OrderError::Store(StoreError::NotFound) => AppError::new(ErrorCode::OrderNotFound),
            OrderError::Store(e) => e.into(),
        }
    }
}
