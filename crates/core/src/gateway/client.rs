//! Gateway order creation client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::GatewayError;
use coursepay_shared::config::GatewaySettings;
use coursepay_shared::types::Currency;

/// A request to create a remote payment order.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Amount in minor units (paise/cents).
    pub amount_minor: i64,
    /// Order currency.
    pub currency: Currency,
    /// Unique receipt reference; idempotent on the gateway side, so a
    /// retried request with the same receipt does not create a second order.
    pub receipt: String,
    /// Free-form metadata attached to the order (course id, student id).
    pub notes: serde_json::Value,
}

/// A remote order created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    /// Opaque order identifier assigned by the gateway.
    pub order_id: String,
    /// Echoed amount in minor units.
    pub amount_minor: i64,
}

/// Client for the payment gateway's orders API.
///
/// Implementations hold no payment state; this is purely a protocol
/// translation boundary.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Creates a remote payment order.
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
}

/// HTTP implementation against a Razorpay-compatible orders API.
#[derive(Debug, Clone)]
pub struct HttpGatewayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl HttpGatewayClient {
    /// Builds a client with the configured bounded timeout.
    pub fn new(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            key_id: settings.key_id.clone(),
            key_secret: settings.key_secret.clone(),
        })
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/orders", self.base_url);
        let body = json!({
            "amount": request.amount_minor,
            "currency": request.currency.to_string(),
            "receipt": request.receipt,
            "notes": request.notes,
        });

        debug!(receipt = %request.receipt, amount = request.amount_minor, "creating gateway order");

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            warn!(status = %status, "gateway returned server error");
            return Err(GatewayError::Unavailable(format!(
                "gateway responded with {status}"
            )));
        }
        if status.is_client_error() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!(
                "{status}: {}",
                truncate(&detail, 256)
            )));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("malformed order response: {e}")))?;

        Ok(GatewayOrder {
            order_id: order.id,
            amount_minor: order.amount,
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_and_long() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc");
    }

    #[test]
    fn test_client_strips_trailing_slash() {
        let settings = GatewaySettings {
            key_id: "key".into(),
            key_secret: "secret".into(),
            webhook_secret: "whsec".into(),
            base_url: "https://api.example.test/v1/".into(),
            timeout_secs: 5,
        };
        let client = HttpGatewayClient::new(&settings).unwrap();
        assert_eq!(client.base_url, "https://api.example.test/v1");
    }
}
