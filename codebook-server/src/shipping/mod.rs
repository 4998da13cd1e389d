//! Shipping labels via Shippo
//!
//! Create a shipment, take the cheapest rate (optionally for one carrier),
//! purchase the label.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub street1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_distance_unit")]
    pub distance_unit: String,
    pub weight: f64,
    #[serde(default = "default_mass_unit")]
    pub mass_unit: String,
}

fn default_distance_unit() -> String {
    "in".into()
}

fn default_mass_unit() -> String {
    "lb".into()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelRequest {
    pub address_from: Address,
    pub address_to: Address,
    pub parcel: Parcel,
    /// Restrict rate selection to one carrier (case-insensitive provider name)
    pub carrier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub tracking_number: String,
    pub carrier: String,
    pub tracking_url: Option<String>,
    pub label_url: String,
}

#[derive(Debug, Error)]
pub enum ShippingError {
    #[error("shipping provider not configured")]
    NotConfigured,
    #[error("no shipping rate available{}", .0.as_deref().map(|c| format!(" for carrier {c}")).unwrap_or_default())]
    NoRates(Option<String>),
    #[error("label purchase failed: {0}")]
    Purchase(String),
    #[error("shipping provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ShippingProvider: Send + Sync {
    async fn create_label(&self, request: LabelRequest) -> Result<Label, ShippingError>;
}

pub struct ShippoClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl ShippoClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ShippingError> {
        let key = self.api_key.as_deref().ok_or(ShippingError::NotConfigured)?;
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("Authorization", format!("ShippoToken {key}"))
            .json(body)
            .send()
            .await
            .map_err(|e| ShippingError::Unavailable(e.to_string()))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ShippingError::Unavailable(format!("invalid response: {e}")))?;
        if !status.is_success() {
            return Err(ShippingError::Unavailable(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

/// Cheapest rate id and its provider, optionally restricted to one carrier
pub(crate) fn pick_rate(rates: &[Value], carrier: Option<&str>) -> Option<(String, String)> {
    rates
        .iter()
        .filter(|r| {
            carrier.is_none_or(|c| {
                r["provider"]
                    .as_str()
                    .is_some_and(|p| p.eq_ignore_ascii_case(c))
            })
        })
        .filter_map(|r| {
            let amount: f64 = match &r["amount"] {
                Value::String(s) => s.parse().ok()?,
                other => other.as_f64()?,
            };
            Some((
                amount,
                r["object_id"].as_str()?.to_string(),
                r["provider"].as_str().unwrap_or("").to_string(),
            ))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id, provider)| (id, provider))
}

#[async_trait]
impl ShippingProvider for ShippoClient {
    async fn create_label(&self, request: LabelRequest) -> Result<Label, ShippingError> {
        let shipment = self
            .post(
                "/shipments/",
                &json!({
                    "address_from": request.address_from,
                    "address_to": request.address_to,
                    "parcels": [request.parcel],
                    "async": false,
                }),
            )
            .await?;

        let rates = shipment["rates"].as_array().cloned().unwrap_or_default();
        let (rate_id, provider) = pick_rate(&rates, request.carrier.as_deref())
            .ok_or_else(|| ShippingError::NoRates(request.carrier.clone()))?;

        let transaction = self
            .post(
                "/transactions/",
                &json!({
                    "rate": rate_id,
                    "label_file_type": "PDF",
                    "async": false,
                }),
            )
            .await?;

        if transaction["status"].as_str() != Some("SUCCESS") {
            let messages = transaction["messages"]
                .as_array()
                .map(|m| {
                    m.iter()
                        .filter_map(|x| x["text"].as_str())
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .unwrap_or_default();
            return Err(ShippingError::Purchase(messages));
        }

        let tracking_number = transaction["tracking_number"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ShippingError::Purchase("no tracking number returned".into()))?;
        let label_url = transaction["label_url"]
            .as_str()
            .ok_or_else(|| ShippingError::Purchase("no label url returned".into()))?;

        tracing::info!(tracking_number, carrier = %provider, "Shipping label purchased");
        Ok(Label {
            tracking_number: tracking_number.to_string(),
            carrier: provider,
            tracking_url: transaction["tracking_url_provider"]
                .as_str()
                .map(String::from),
            label_url: label_url.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_cheapest_rate() {
        let rates = vec![
            json!({"object_id": "r1", "provider": "USPS", "amount": "7.50"}),
            json!({"object_id": "r2", "provider": "UPS", "amount": "5.25"}),
            json!({"object_id": "r3", "provider": "USPS", "amount": "6.10"}),
        ];
        assert_eq!(pick_rate(&rates, None), Some(("r2".into(), "UPS".into())));
        assert_eq!(
            pick_rate(&rates, Some("usps")),
            Some(("r3".into(), "USPS".into()))
        );
        assert_eq!(pick_rate(&rates, Some("FedEx")), None);
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = ShippoClient::new(None, "https://api.goshippo.com").unwrap();
        let err = client.post("/shipments/", &json!({})).await.unwrap_err();
        assert!(matches!(err, ShippingError::NotConfigured));
    }
}
