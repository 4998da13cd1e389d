//! Payment intents and the processor webhook
//!
//! POST /payment/webhook must receive the raw body for signature
//! verification, so it takes `Bytes` rather than JSON.

use std::collections::BTreeMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shared::error::{AppError, ErrorCode};
use shared::models::{CartItem, Order, PaymentStatus, cart_quantity};

use crate::auth::AuthContext;
use crate::db;
use crate::email::{self, Template};
use crate::money;
use crate::state::AppState;
use crate::stripe::{self, CreateIntent, IntentStatus};

use super::{ApiJson, ApiResult};

#[derive(Deserialize)]
pub struct CreateIntentRequest {
    /// Currency units
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub cart_list: Vec<CartItem>,
}

#[derive(Serialize)]
pub struct CreateIntentResponse {
    pub client_secret: String,
    pub intent_id: String,
    pub status: IntentStatus,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub status: IntentStatus,
    /// Currency units
    pub amount: f64,
    pub currency: String,
}

/// POST /payment/create-intent
pub async fn create_intent(
    State(state): State<AppState>,
    ctx: AuthContext,
    ApiJson(req): ApiJson<CreateIntentRequest>,
) -> ApiResult<CreateIntentResponse> {
    if !req.amount.is_finite() || req.amount <= 0.0 {
        return Err(AppError::validation("amount must be a positive number"));
    }
    let amount_minor = money::to_minor_units(req.amount)
        .ok_or_else(|| AppError::validation("amount is out of range"))?;
    if amount_minor <= 0 {
        return Err(AppError::validation("amount is below the smallest currency unit"));
    }
    let currency = req
        .currency
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| state.config.currency.clone());

    // Caller-supplied metadata first so identity fields cannot be overridden
    let mut metadata: BTreeMap<String, String> = req
        .metadata
        .into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect();
    let item_count = cart_quantity(&req.cart_list)
        .ok_or_else(|| AppError::validation("cart quantity is out of range"))?;
    metadata.insert("userId".into(), ctx.user_id.clone());
    metadata.insert("userEmail".into(), ctx.email.clone());
    metadata.insert("itemCount".into(), item_count.to_string());

    let idempotency_key = stripe::cart_fingerprint(&ctx.user_id, &req.cart_list, amount_minor);
    let created = state
        .gateway
        .create_intent(CreateIntent {
            amount_minor,
            currency,
            metadata,
            idempotency_key,
        })
        .await?;

    tracing::info!(
        user_id = %ctx.user_id,
        intent_id = %created.intent_id,
        amount_minor,
        "Payment intent created"
    );
    Ok(Json(CreateIntentResponse {
        client_secret: created.client_secret,
        intent_id: created.intent_id,
        status: created.status,
    }))
}

/// GET /payment/verify/{intent_id}
pub async fn verify(
    State(state): State<AppState>,
    _ctx: AuthContext,
    Path(intent_id): Path<String>,
) -> ApiResult<VerifyResponse> {
    if !stripe::is_intent_id(&intent_id) {
        return Err(AppError::validation("Invalid payment intent id"));
    }
    let details = state.gateway.verify(&intent_id).await?;
    Ok(Json(VerifyResponse {
        status: details.status,
        amount: money::from_minor_units(details.amount),
        currency: details.currency,
    }))
}

/// POST /payment/webhook
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Value> {
    let sig_header = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing Stripe-Signature header");
            AppError::new(ErrorCode::InvalidWebhookSignature)
        })?;

    let now_secs = chrono::Utc::now().timestamp();
    if let Err(e) = stripe::verify_webhook_signature(
        &body,
        sig_header,
        &state.config.stripe_webhook_secret,
        now_secs,
    ) {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return Err(AppError::new(ErrorCode::InvalidWebhookSignature));
    }

    let event: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(%e, "Failed to parse webhook JSON");
        AppError::validation("Invalid webhook payload")
    })?;

    let event_type = event["type"].as_str().unwrap_or("");
    let intent = &event["data"]["object"];
    let Some(intent_id) = intent["id"].as_str() else {
        tracing::debug!(event_type, "Webhook event without object id, ignored");
        return Ok(Json(json!({ "received": true })));
    };
    tracing::info!(event_type, intent_id, "Received Stripe webhook");

    match event_type {
        "payment_intent.succeeded" => {
            state
                .orders
                .record_payment_status(intent_id, PaymentStatus::Succeeded)
                .await?;
        }
        "payment_intent.processing" => {
            let changed = state
                .orders
                .record_payment_status(intent_id, PaymentStatus::Processing)
                .await?;
            for order in &changed {
                state
                    .notifier
                    .notify_customer(Template::PaymentProcessing, order)
                    .await;
            }
        }
        "payment_intent.payment_failed" => {
            let changed = state
                .orders
                .record_payment_status(intent_id, PaymentStatus::Failed)
                .await?;
            handle_payment_failed(&state, intent_id, intent, &changed).await?;
        }
        _ => tracing::debug!(event_type, "Unhandled webhook event type"),
    }

    Ok(Json(json!({ "received": true })))
}

/// Customer and admin mail for a failed payment
///
/// Orders whose status was already `failed` are skipped; a payment that
/// failed before any order was placed is reported to `metadata.userEmail`.
async fn handle_payment_failed(
    state: &AppState,
    intent_id: &str,
    intent: &Value,
    changed: &[Order],
) -> Result<(), AppError> {
    let reason = intent["last_payment_error"]["message"]
        .as_str()
        .unwrap_or_default();

    if changed.is_empty() {
        if !db::orders::find_by_intent(state.store.as_ref(), intent_id)
            .await?
            .is_empty()
        {
            tracing::debug!(intent_id, "Payment failure already recorded");
            return Ok(());
        }
        let Some(customer_email) = intent["metadata"]["userEmail"].as_str() else {
            tracing::warn!(intent_id, "Failed payment without order or customer email");
            return Ok(());
        };
        let data = json!({
            "payment_intent_id": intent_id,
            "customer_email": customer_email,
            "amount": intent["amount"].as_i64().map(money::from_minor_units),
            "error": reason,
        });
        state
            .notifier
            .send(customer_email, Template::PaymentFailed, &data)
            .await;
        state
            .notifier
            .notify_admin(Template::AdminPaymentFailure, &data)
            .await;
        return Ok(());
    }

    for order in changed {
        let mut data = email::order_data(order);
        data["error"] = json!(reason);
        state
            .notifier
            .send(&order.user.email, Template::PaymentFailed, &data)
            .await;
        state
            .notifier
            .notify_admin(Template::AdminPaymentFailure, &data)
            .await;
    }
    Ok(())
}
