//! HTTP handlers for registration, listing, clearing and dispatch.

// Rust guideline compliant 2026-02

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::dispatch::{DeliveryOutcome, Notification};
use crate::registry::{truncate_endpoint, SubscriptionRecord};

/// Response to a successful registration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSubscriptionResponse {
    /// Human readable result
    pub message: &'static str,
    /// Subscriptions stored after the upsert
    pub total_subscriptions: usize,
    /// Registered endpoint, truncated
    pub endpoint: String,
}

/// Register (or refresh) a browser push subscription.
///
/// POST /api/save-subscription
pub async fn save_subscription(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubscriptionRecord>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SaveSubscriptionResponse>)> {
    let Json(record) = payload.map_err(|rejection| {
        log::warn!("[Api] Rejected subscription: {}", rejection.body_text());
        ApiError::InvalidSubscription
    })?;

    let endpoint = record.display_endpoint();
    let inserted = state.registry.upsert(record)?;

    let response = SaveSubscriptionResponse {
        message: if inserted {
            "Subscription saved."
        } else {
            "Subscription updated."
        },
        total_subscriptions: state.registry.count(),
        endpoint,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Snapshot of all registered subscriptions.
#[derive(Debug, Serialize)]
pub struct ListSubscriptionsResponse {
    /// Subscriptions in registration order
    pub subscriptions: Vec<SubscriptionRecord>,
    /// Number of subscriptions
    pub count: usize,
    /// Time of the snapshot (RFC 3339)
    pub timestamp: String,
}

/// List registered subscriptions.
///
/// GET /api/save-subscription
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
) -> Json<ListSubscriptionsResponse> {
    let subscriptions = state.registry.list();
    Json(ListSubscriptionsResponse {
        count: subscriptions.len(),
        subscriptions,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Response to an administrative clear.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearSubscriptionsResponse {
    /// Human readable result
    pub message: &'static str,
    /// Subscriptions stored before the clear
    pub previous_count: usize,
    /// Time of the clear (RFC 3339)
    pub timestamp: String,
}

/// Remove every subscription.
///
/// DELETE /api/save-subscription
pub async fn clear_subscriptions(
    State(state): State<Arc<AppState>>,
) -> Json<ClearSubscriptionsResponse> {
    let previous_count = state.registry.clear();
    Json(ClearSubscriptionsResponse {
        message: "All subscriptions cleared",
        previous_count,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Body of an unsubscribe request.
#[derive(Debug, Deserialize)]
pub struct RemoveSubscriptionRequest {
    /// Endpoint to forget
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Response to an unsubscribe request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSubscriptionResponse {
    /// Whether a subscription was removed
    pub removed: bool,
    /// Subscriptions stored after the removal
    pub total_subscriptions: usize,
}

/// Forget a single subscription (browser unsubscribed).
///
/// POST /api/remove-subscription
pub async fn remove_subscription(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RemoveSubscriptionRequest>, JsonRejection>,
) -> ApiResult<Json<RemoveSubscriptionResponse>> {
    let endpoint = payload
        .ok()
        .and_then(|Json(request)| request.endpoint)
        .filter(|endpoint| !endpoint.is_empty())
        .ok_or(ApiError::InvalidSubscription)?;

    let removed = state.registry.remove(&endpoint);
    if !removed {
        log::debug!("[Api] No subscription for {}", truncate_endpoint(&endpoint));
    }

    Ok(Json(RemoveSubscriptionResponse {
        removed,
        total_subscriptions: state.registry.count(),
    }))
}

/// Report of a dispatch round.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationResponse {
    /// Human readable result
    pub message: &'static str,
    /// Per-subscription outcomes
    pub results: Vec<DeliveryOutcome>,
    /// Sends the push service accepted
    pub success_count: usize,
    /// Subscriptions of the round kept after pruning
    pub valid_subscriptions_count: usize,
    /// Subscriptions the round processed
    pub total_subscriptions: usize,
}

/// Push a notification to every registered subscription.
///
/// The round runs on its own task, so a client that disconnects mid-round
/// does not stop delivery or the final prune.
///
/// POST /api/send-notification
pub async fn send_notification(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Notification>, JsonRejection>,
) -> ApiResult<Json<SendNotificationResponse>> {
    let Json(notification) =
        payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let dispatcher = Arc::clone(&state.dispatcher);
    let round = tokio::spawn(async move { dispatcher.dispatch(&notification).await });
    let report = round.await.map_err(|e| {
        log::error!("[Api] Dispatch round aborted: {e}");
        ApiError::Internal("Dispatch round failed".to_string())
    })??;

    Ok(Json(SendNotificationResponse {
        message: "Notifications sent",
        results: report.outcomes,
        success_count: report.success_count,
        valid_subscriptions_count: report.valid_count,
        total_subscriptions: report.total,
    }))
}

/// VAPID public key response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidPublicKeyResponse {
    /// Base64url `applicationServerKey` for `pushManager.subscribe()`
    pub public_key: String,
}

/// Public key browsers subscribe with.
///
/// GET /api/vapid-public-key
pub async fn vapid_public_key(State(state): State<Arc<AppState>>) -> Json<VapidPublicKeyResponse> {
    Json(VapidPublicKeyResponse {
        public_key: state.vapid_public_key.clone(),
    })
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Registered subscriptions
    pub subscriptions: usize,
}

/// Health check handler.
///
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        subscriptions: state.registry.count(),
    })
}
