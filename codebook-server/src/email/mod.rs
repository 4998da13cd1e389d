//! Transactional email
//!
//! [`Notifier`] renders one of a closed set of templates and hands it to a
//! [`Mailer`] backend (SES in deployments, log-only in development).
//! Delivery is best-effort: failures are logged and never propagate into
//! the order flow.

pub mod ses;
pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use shared::models::{Order, Product};
use thiserror::Error;

pub use ses::SesMailer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    OrderConfirmation,
    PaymentProcessing,
    PaymentFailed,
    ShippingNotification,
    DeliveryConfirmation,
    OrderCanceled,
    OrderRefunded,
    AdminNewOrder,
    AdminLowStock,
    AdminOutOfStock,
    AdminPaymentFailure,
    AdminRefundProcessed,
}

impl Template {
    pub fn id(&self) -> &'static str {
        match self {
            Self::OrderConfirmation => "order-confirmation",
            Self::PaymentProcessing => "payment-processing",
            Self::PaymentFailed => "payment-failed",
            Self::ShippingNotification => "shipping-notification",
            Self::DeliveryConfirmation => "delivery-confirmation",
            Self::OrderCanceled => "order-canceled",
            Self::OrderRefunded => "order-refunded",
            Self::AdminNewOrder => "admin-new-order",
            Self::AdminLowStock => "admin-low-stock",
            Self::AdminOutOfStock => "admin-out-of-stock",
            Self::AdminPaymentFailure => "admin-payment-failure",
            Self::AdminRefundProcessed => "admin-refund-processed",
        }
    }

    /// Admin templates always go to the configured admin address
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::AdminNewOrder
                | Self::AdminLowStock
                | Self::AdminOutOfStock
                | Self::AdminPaymentFailure
                | Self::AdminRefundProcessed
        )
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub template: Template,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid message: {0}")]
    Build(String),
    #[error("delivery failed: {0}")]
    Send(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Development backend: logs instead of sending
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            template = %email.template,
            subject = %email.subject,
            "Email (log only)"
        );
        Ok(())
    }
}

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    admin_email: String,
    app_base_url: String,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        admin_email: impl Into<String>,
        app_base_url: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            admin_email: admin_email.into(),
            app_base_url: app_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Render and send; returns whether the backend accepted the message.
    pub async fn send(&self, recipient: &str, template: Template, data: &Value) -> bool {
        let to = if template.is_admin() {
            self.admin_email.as_str()
        } else {
            recipient
        };
        if to.is_empty() {
            tracing::warn!(template = %template, "No recipient, email skipped");
            return false;
        }

        let (subject, body) = templates::render(template, data, &self.app_base_url);
        let email = Email {
            to: to.to_string(),
            template,
            subject,
            body,
        };
        match self.mailer.send(&email).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(to = %email.to, template = %template, error = %e, "Email delivery failed");
                false
            }
        }
    }

    pub async fn notify_admin(&self, template: Template, data: &Value) -> bool {
        self.send(&self.admin_email, template, data).await
    }

    /// Customer email for an order, sent to the address snapshotted on the order
    pub async fn notify_customer(&self, template: Template, order: &Order) -> bool {
        self.send(&order.user.email, template, &order_data(order)).await
    }
}

/// Template data for order emails
pub fn order_data(order: &Order) -> Value {
    json!({
        "order_id": order.id,
        "customer_name": order.user.name,
        "customer_email": order.user.email,
        "amount": order.amount_paid,
        "quantity": order.item_count(),
        "status": order.status.as_str(),
        "items": order.cart_list.iter().map(|i| json!({
            "name": i.name,
            "quantity": i.quantity,
            "price": i.price,
        })).collect::<Vec<_>>(),
        "tracking_number": order.tracking_number,
        "tracking_carrier": order.tracking_carrier,
        "tracking_url": order.tracking_url,
        "refund_amount": order.refund_amount,
        "refund_reason": order.refund_reason,
        "payment_intent_id": order.payment_intent_id,
    })
}

/// Template data for stock alerts
pub fn stock_data(product: &Product, stock: i64) -> Value {
    json!({
        "product_id": product.id,
        "product_name": product.name,
        "stock": stock,
        "threshold": product.low_stock_threshold,
    })
}
