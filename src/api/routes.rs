//! API route definitions.

// Rust guideline compliant 2026-02

use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};

use super::error::ApiError;
use super::handlers;
use super::state::AppState;

/// Creates the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(state.config.cors_enabled);

    let api_routes = Router::new()
        .route(
            "/save-subscription",
            post(handlers::save_subscription)
                .get(handlers::list_subscriptions)
                .delete(handlers::clear_subscriptions),
        )
        .route("/remove-subscription", post(handlers::remove_subscription))
        .route("/send-notification", post(handlers::send_notification))
        .route("/vapid-public-key", get(handlers::vapid_public_key));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .with_state(state)
}

/// Builds the CORS layer. Registration is called from browser pages that
/// may be served from another origin.
fn build_cors_layer(enabled: bool) -> CorsLayer {
    if !enabled {
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Turns a handler panic into a 500 `{error}` response.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("Internal server error: {detail}")).into_response()
}
