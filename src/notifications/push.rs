//! Web push message sending.
//!
//! [`PushSender`] is the seam the dispatcher delivers through. The
//! production implementation, [`WebPushSender`], encrypts payloads and
//! signs VAPID JWTs with the `web-push` crate and sends the HTTP request
//! itself via reqwest.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::vapid::VapidKeys;
use crate::constants::TERMINAL_STATUS_CODES;
use crate::registry::SubscriptionRecord;

/// Why a single push send failed.
///
/// This is data recorded in the dispatch report, never an error that
/// aborts a round. `status_code` is 0 when no HTTP response was received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFailure {
    /// Failure class (`WebPushError`, `TransportError`, `TimeoutError`, ...).
    pub name: String,
    /// Human readable description.
    pub message: String,
    /// HTTP status returned by the push service, or 0.
    pub status_code: u16,
    /// Response body returned by the push service, if any.
    pub body: String,
}

impl SendFailure {
    /// The push service answered with a non-success status.
    pub fn http(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            name: "WebPushError".to_string(),
            message: format!("Received unexpected response code {status_code}"),
            status_code,
            body: body.into(),
        }
    }

    /// The request never produced a response (DNS, TLS, connection reset...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            name: "TransportError".to_string(),
            message: message.into(),
            status_code: 0,
            body: String::new(),
        }
    }

    /// The message could not be built for this subscription (bad key material).
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            name: "MalformedSubscription".to_string(),
            message: message.into(),
            status_code: 0,
            body: String::new(),
        }
    }

    /// The send did not finish within the per-send timeout.
    pub fn timeout(after: Duration) -> Self {
        Self {
            name: "TimeoutError".to_string(),
            message: format!("Push send timed out after {}ms", after.as_millis()),
            status_code: 0,
            body: String::new(),
        }
    }

    /// Whether the push service reported the subscription permanently invalid.
    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATUS_CODES.contains(&self.status_code)
    }
}

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Delivers one serialized payload to one subscription.
#[async_trait]
pub trait PushSender: Send + Sync + std::fmt::Debug {
    /// Send `payload` to `subscription`.
    async fn send(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<(), SendFailure>;
}

/// Sends encrypted web push messages with VAPID authentication.
///
/// Reuses one `reqwest::Client` across sends for connection pooling.
#[derive(Debug, Clone)]
pub struct WebPushSender {
    client: reqwest::Client,
    vapid_private_b64: String,
    subject: String,
    ttl: u32,
}

impl WebPushSender {
    /// Create a sender signing with `keys` and advertising `subject` as the VAPID contact.
    pub fn new(
        client: reqwest::Client,
        keys: &VapidKeys,
        subject: impl Into<String>,
        ttl: u32,
    ) -> Self {
        Self {
            client,
            vapid_private_b64: keys.private_key_base64url().to_string(),
            subject: subject.into(),
            ttl,
        }
    }

    fn build_message(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<web_push::WebPushMessage> {
        use web_push::{
            ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder,
        };

        let sub_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut sig_builder = VapidSignatureBuilder::from_base64(&self.vapid_private_b64, &sub_info)
            .context("Failed to build VAPID signature")?;
        sig_builder.add_claim("sub", self.subject.as_str());
        let sig = sig_builder.build().context("Failed to sign VAPID JWT")?;

        let mut builder = WebPushMessageBuilder::new(&sub_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(sig);
        builder.set_ttl(self.ttl);

        builder.build().context("Failed to build web push message")
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<(), SendFailure> {
        let message = self
            .build_message(subscription, payload)
            .map_err(|e| SendFailure::malformed(format!("{e:#}")))?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }

        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SendFailure::transport(format!("Web push HTTP request failed: {e}")))?;
        let status = response.status().as_u16();

        match status {
            200..=299 => Ok(()),
            _ => {
                let body = response.text().await.unwrap_or_default();
                if status == 410 {
                    log::info!(
                        "[WebPush] Subscription expired (410 Gone): {}",
                        subscription.display_endpoint()
                    );
                } else {
                    log::warn!(
                        "[WebPush] Send failed (HTTP {status}) for {}",
                        subscription.display_endpoint()
                    );
                }
                Err(SendFailure::http(status, body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(SendFailure::http(410, "").is_terminal());
        assert!(SendFailure::http(404, "").is_terminal());
        assert!(!SendFailure::http(500, "").is_terminal());
        assert!(!SendFailure::http(429, "").is_terminal());
        assert!(!SendFailure::transport("connection refused").is_terminal());
        assert!(!SendFailure::timeout(Duration::from_secs(1)).is_terminal());
    }

    #[test]
    fn test_send_failure_serializes_camel_case() {
        let value = serde_json::to_value(SendFailure::http(410, "gone")).unwrap();
        assert_eq!(value["name"], "WebPushError");
        assert_eq!(value["statusCode"], 410);
        assert_eq!(value["body"], "gone");
    }

    #[test]
    fn test_build_message_rejects_malformed_keys() {
        let keys = VapidKeys::generate().expect("generate keys");
        let sender =
            WebPushSender::new(reqwest::Client::new(), &keys, "mailto:test@example.com", 60);
        let subscription =
            SubscriptionRecord::new("https://push.example.com/1", "not-a-key", "nope");

        assert!(sender.build_message(&subscription, b"{}").is_err());
    }
}
