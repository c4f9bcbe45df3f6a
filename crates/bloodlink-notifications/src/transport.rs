//! Push transport boundary.
//!
//! The engine never inspects transport internals: it hands a recipient
//! channel token and rendered content to a `PushTransport` and records the
//! boolean-ish outcome. `HttpPushTransport` is the default adapter, posting
//! signed JSON payloads to a push gateway.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::json;
use sha2::Sha256;
use thiserror::Error;
use time::OffsetDateTime;

use crate::templates::RenderedMessage;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone)]
pub struct SendResult {
    pub delivered: bool,
    pub error: Option<String>,
}

impl SendResult {
    pub fn delivered() -> Self {
        Self {
            delivered: true,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            error: Some(error.into()),
        }
    }
}

/// Boundary trait for push delivery.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Attempts delivery to the device behind `token`.
    ///
    /// A `SendResult` with `delivered == false` is a normal, recorded
    /// failure; `Err` covers transport-level faults (bad config, connection
    /// refused) and is recorded the same way by the dispatcher.
    async fn send(
        &self,
        token: &str,
        message: &RenderedMessage,
    ) -> Result<SendResult, TransportError>;
}

/// Push gateway adapter: POSTs the rendered message as JSON, with an
/// HMAC-SHA256 signature header when a shared secret is configured.
pub struct HttpPushTransport {
    http_client: Client,
    endpoint: String,
    secret: Option<String>,
}

impl HttpPushTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            endpoint: endpoint.into(),
            secret: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    fn sign_payload(&self, payload: &str, secret: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(
        &self,
        token: &str,
        message: &RenderedMessage,
    ) -> Result<SendResult, TransportError> {
        if self.endpoint.is_empty() {
            return Err(TransportError::InvalidConfig(
                "push gateway endpoint is empty".into(),
            ));
        }

        let timestamp = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();

        let payload = json!({
            "to": token,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
            "timestamp": timestamp,
        });

        let payload_str = serde_json::to_string(&payload)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");

        if let Some(secret) = &self.secret {
            let signature = self.sign_payload(&payload_str, secret);
            request = request.header("X-Signature-256", format!("sha256={signature}"));
        }

        let response = request
            .body(payload_str)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if response.status().is_success() {
            Ok(SendResult::delivered())
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            Ok(SendResult::rejected(format!(
                "push gateway returned {status}: {detail}"
            )))
        }
    }
}
