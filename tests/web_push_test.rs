//! Integration tests for `WebPushSender` against a mock push service.
//!
//! The mock stands in for FCM/Mozilla autopush: it accepts the encrypted
//! request and answers with whatever status the test scripts.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::OsRng;
use push_hub::dispatch::{DeliveryStatus, DispatchOptions, Dispatcher, Notification};
use push_hub::{PushSender, Registry, SubscriptionRecord, VapidKeys, WebPushSender};
use std::sync::Arc;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Subscription with real browser-style key material pointing at `endpoint`.
fn browser_subscription(endpoint: String) -> SubscriptionRecord {
    let browser_key = SigningKey::random(&mut OsRng);
    let public = browser_key.verifying_key().to_encoded_point(false);
    SubscriptionRecord::new(
        endpoint,
        BASE64URL.encode(public.as_bytes()),
        BASE64URL.encode([7u8; 16]),
    )
}

fn sender() -> WebPushSender {
    let keys = VapidKeys::generate().expect("generate VAPID keys");
    WebPushSender::new(reqwest::Client::new(), &keys, "mailto:ops@example.com", 60)
}

#[tokio::test]
async fn test_send_accepted_by_push_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/accepted"))
        .and(header("content-encoding", "aes128gcm"))
        .and(header("ttl", "60"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let subscription = browser_subscription(format!("{}/push/accepted", server.uri()));
    let result = sender().send(&subscription, br#"{"title":"Hi"}"#).await;

    assert!(result.is_ok(), "expected success, got {result:?}");
}

#[tokio::test]
async fn test_send_gone_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/gone"))
        .respond_with(
            ResponseTemplate::new(410)
                .set_body_string("push subscription has unsubscribed or expired"),
        )
        .mount(&server)
        .await;

    let subscription = browser_subscription(format!("{}/push/gone", server.uri()));
    let failure = sender().send(&subscription, b"{}").await.unwrap_err();

    assert_eq!(failure.status_code, 410);
    assert!(failure.is_terminal());
    assert!(failure.body.contains("unsubscribed"));
}

#[tokio::test]
async fn test_send_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/flaky"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let subscription = browser_subscription(format!("{}/push/flaky", server.uri()));
    let failure = sender().send(&subscription, b"{}").await.unwrap_err();

    assert_eq!(failure.status_code, 500);
    assert_eq!(failure.body, "oops");
    assert!(!failure.is_terminal());
}

#[tokio::test]
async fn test_send_connection_refused_has_no_status() {
    // Nothing listens on port 1
    let subscription = browser_subscription("http://127.0.0.1:1/push/nowhere".to_string());
    let failure = sender().send(&subscription, b"{}").await.unwrap_err();

    assert_eq!(failure.name, "TransportError");
    assert_eq!(failure.status_code, 0);
}

#[tokio::test]
async fn test_send_malformed_keys_never_reaches_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let subscription =
        SubscriptionRecord::new(format!("{}/push/bad", server.uri()), "garbage", "garbage");
    let failure = sender().send(&subscription, b"{}").await.unwrap_err();

    assert_eq!(failure.name, "MalformedSubscription");
}

#[tokio::test]
async fn test_dispatch_round_prunes_gone_subscription() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/alive"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/push/dead"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let registry = Arc::new(Registry::new());
    let alive = browser_subscription(format!("{}/push/alive", server.uri()));
    let dead = browser_subscription(format!("{}/push/dead", server.uri()));
    registry.upsert(alive.clone()).unwrap();
    registry.upsert(dead).unwrap();

    let dispatcher = Dispatcher::new(
        Arc::clone(&registry),
        Arc::new(sender()),
        DispatchOptions::default(),
    );
    let report = dispatcher
        .dispatch(&Notification::new("Deploy finished", "All green"))
        .await
        .unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.valid_count, 1);
    assert_eq!(report.outcomes[0].status, DeliveryStatus::Success);
    assert_eq!(report.outcomes[1].status, DeliveryStatus::Failure);
    assert_eq!(registry.list(), vec![alive]);
}
