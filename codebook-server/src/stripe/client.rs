//! Stripe REST client

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{
    CreateIntent, IntentCreated, IntentDetails, IntentStatus, PaymentError, PaymentGateway,
    RefundRequest, RefundResult, is_intent_id,
};

const STRIPE_API: &str = "https://api.stripe.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Reasons Stripe accepts in the `reason` field; anything else goes to metadata
const STRIPE_REFUND_REASONS: [&str; 3] = ["duplicate", "fraudulent", "requested_by_customer"];

#[derive(Clone)]
pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            secret_key: secret_key.into(),
            base_url: STRIPE_API.to_string(),
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<Value, PaymentError> {
        let resp = request
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| PaymentError::Unavailable(format!("{what}: {e}")))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| PaymentError::Unavailable(format!("{what}: invalid response: {e}")))?;

        if status.is_success() {
            return Ok(body);
        }
        Err(map_error(status.as_u16(), &body, what))
    }
}

/// Classify a Stripe error response
fn map_error(status: u16, body: &Value, what: &str) -> PaymentError {
    let err = &body["error"];
    let message = err["message"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| format!("{what} failed with HTTP {status}"));
    let kind = err["type"].as_str().unwrap_or("");
    let code = err["code"].as_str().unwrap_or("");

    match (status, kind, code) {
        (_, "card_error", _) | (402, _, _) => PaymentError::Declined(message),
        (404, _, _) | (_, _, "resource_missing") => PaymentError::NotFound(message),
        (429, _, _) => PaymentError::RateLimited,
        (400..=499, _, _) => PaymentError::InvalidRequest(message),
        _ => PaymentError::Unavailable(message),
    }
}

fn required_str(body: &Value, key: &str, what: &str) -> Result<String, PaymentError> {
    body[key]
        .as_str()
        .map(String::from)
        .ok_or_else(|| PaymentError::Unavailable(format!("{what}: response missing {key}")))
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, request: CreateIntent) -> Result<IntentCreated, PaymentError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), request.amount_minor.to_string()),
            ("currency".into(), request.currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        for (k, v) in &request.metadata {
            form.push((format!("metadata[{k}]"), v.clone()));
        }

        let body = self
            .send(
                self.http
                    .post(format!("{}/payment_intents", self.base_url))
                    .header("Idempotency-Key", &request.idempotency_key)
                    .form(&form),
                "create_intent",
            )
            .await?;

        Ok(IntentCreated {
            intent_id: required_str(&body, "id", "create_intent")?,
            client_secret: required_str(&body, "client_secret", "create_intent")?,
            status: IntentStatus::from_processor(body["status"].as_str().unwrap_or("")),
        })
    }

    async fn verify(&self, intent_id: &str) -> Result<IntentDetails, PaymentError> {
        if !is_intent_id(intent_id) {
            return Err(PaymentError::InvalidRequest(format!(
                "malformed payment intent id {intent_id:?}"
            )));
        }
        let body = self
            .send(
                self.http
                    .get(format!("{}/payment_intents/{intent_id}", self.base_url)),
                "verify",
            )
            .await?;

        Ok(IntentDetails {
            status: IntentStatus::from_processor(body["status"].as_str().unwrap_or("")),
            amount: body["amount"].as_i64().unwrap_or(0),
            currency: body["currency"].as_str().unwrap_or("").to_string(),
        })
    }

    async fn refund(
        &self,
        intent_id: &str,
        request: RefundRequest,
    ) -> Result<RefundResult, PaymentError> {
        let mut form: Vec<(String, String)> = vec![("payment_intent".into(), intent_id.into())];
        if let Some(amount) = request.amount {
            form.push(("amount".into(), amount.to_string()));
        }
        if let Some(reason) = &request.reason {
            if STRIPE_REFUND_REASONS.contains(&reason.as_str()) {
                form.push(("reason".into(), reason.clone()));
            } else {
                form.push(("metadata[reason]".into(), reason.clone()));
            }
        }

        let body = self
            .send(
                self.http
                    .post(format!("{}/refunds", self.base_url))
                    .header("Idempotency-Key", &request.idempotency_key)
                    .form(&form),
                "refund",
            )
            .await?;

        Ok(RefundResult {
            refund_id: required_str(&body, "id", "refund")?,
            amount_refunded: body["amount"].as_i64().unwrap_or(0),
            status: body["status"].as_str().unwrap_or("pending").to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_classification() {
        let declined = json!({"error": {"type": "card_error", "message": "Your card was declined."}});
        assert!(matches!(
            map_error(402, &declined, "refund"),
            PaymentError::Declined(m) if m == "Your card was declined."
        ));

        let missing = json!({"error": {"type": "invalid_request_error", "code": "resource_missing", "message": "No such payment_intent"}});
        assert!(matches!(
            map_error(404, &missing, "verify"),
            PaymentError::NotFound(_)
        ));

        assert!(matches!(
            map_error(429, &json!({}), "verify"),
            PaymentError::RateLimited
        ));

        let invalid = json!({"error": {"type": "invalid_request_error", "message": "Amount must be positive"}});
        assert!(matches!(
            map_error(400, &invalid, "create_intent"),
            PaymentError::InvalidRequest(_)
        ));

        assert!(matches!(
            map_error(502, &json!({}), "refund"),
            PaymentError::Unavailable(m) if m.contains("HTTP 502")
        ));
    }
}
