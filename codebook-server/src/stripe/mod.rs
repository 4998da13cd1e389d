//! Card payments via Stripe
//!
//! [`PaymentGateway`] is the seam the order flow talks to; [`StripeGateway`]
//! implements it over the Stripe REST API (no SDK dependency).

pub mod client;

use std::collections::BTreeMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::models::{CartItem, PaymentStatus};
use thiserror::Error;

pub use client::StripeGateway;

/// Accepted clock skew for webhook timestamps (seconds)
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Payment intent status as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    Processing,
    RequiresAction,
    Succeeded,
    Canceled,
    Failed,
}

impl IntentStatus {
    /// Map a processor status; anything outside the known set is still in flight
    pub fn from_processor(status: &str) -> Self {
        match status {
            "requires_payment_method" => Self::RequiresPaymentMethod,
            "requires_action" => Self::RequiresAction,
            "succeeded" => Self::Succeeded,
            "canceled" => Self::Canceled,
            "failed" => Self::Failed,
            // requires_confirmation, requires_capture, processing
            _ => Self::Processing,
        }
    }
}

impl From<IntentStatus> for PaymentStatus {
    fn from(status: IntentStatus) -> Self {
        match status {
            IntentStatus::RequiresPaymentMethod => PaymentStatus::RequiresPaymentMethod,
            IntentStatus::Processing => PaymentStatus::Processing,
            IntentStatus::RequiresAction => PaymentStatus::RequiresAction,
            IntentStatus::Succeeded => PaymentStatus::Succeeded,
            IntentStatus::Canceled => PaymentStatus::Canceled,
            IntentStatus::Failed => PaymentStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIntent {
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentCreated {
    pub intent_id: String,
    pub client_secret: String,
    pub status: IntentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentDetails {
    pub status: IntentStatus,
    /// Minor units
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundRequest {
    /// Minor units; `None` refunds the full amount
    pub amount: Option<i64>,
    pub reason: Option<String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundResult {
    pub refund_id: String,
    pub amount_refunded: i64,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),
    #[error("invalid payment request: {0}")]
    InvalidRequest(String),
    #[error("payment not found: {0}")]
    NotFound(String),
    #[error("payment provider rate limited")]
    RateLimited,
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: CreateIntent) -> Result<IntentCreated, PaymentError>;

    async fn verify(&self, intent_id: &str) -> Result<IntentDetails, PaymentError>;

    async fn refund(
        &self,
        intent_id: &str,
        request: RefundRequest,
    ) -> Result<RefundResult, PaymentError>;
}

/// Deterministic key for intent creation: same user, same cart, same amount → same intent
pub fn cart_fingerprint(user_id: &str, items: &[CartItem], amount_minor: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    for item in items {
        hasher.update(b"|");
        hasher.update(item.product_id.as_bytes());
        hasher.update(b":");
        hasher.update(item.quantity.to_string().as_bytes());
    }
    hasher.update(b"|");
    hasher.update(amount_minor.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// `pi_` followed by ASCII letters, digits or `_`; ids end up in request paths
pub fn is_intent_id(id: &str) -> bool {
    id.strip_prefix("pi_").is_some_and(|rest| {
        !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
    })
}

pub fn refund_idempotency_key(order_id: &str, amount: Option<i64>) -> String {
    match amount {
        Some(a) => format!("refund-{order_id}-{a}"),
        None => format!("refund-{order_id}-full"),
    }
}

/// Verify a `Stripe-Signature` header (HMAC-SHA256 over `"{t}.{payload}"`)
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now_secs: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    if timestamp.is_empty() || signatures.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if (now_secs - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err("Webhook timestamp outside tolerance");
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Secret rotation can produce several v1 entries; any match is enough
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err("Webhook signature mismatch");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn sign_webhook(payload: &[u8], secret: &str, ts: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{ts}.").as_bytes());
    mac.update(payload);
    format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
}
