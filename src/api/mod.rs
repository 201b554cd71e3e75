//! HTTP API for the push hub.
//!
//! - `POST   /api/save-subscription` - register or refresh a subscription
//! - `GET    /api/save-subscription` - list subscriptions
//! - `DELETE /api/save-subscription` - clear all subscriptions
//! - `POST   /api/remove-subscription` - forget one subscription
//! - `POST   /api/send-notification` - run a dispatch round
//! - `GET    /api/vapid-public-key` - `applicationServerKey` for browsers
//! - `GET    /health` - health check

// Rust guideline compliant 2026-02

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

/// API server.
#[derive(Debug)]
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a new API server around `state`.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Returns a reference to the application state.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Binds the configured address and serves until `shutdown_signal` resolves.
    pub async fn run_with_shutdown(
        self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let addr = &self.state.config.bind_address;
        let socket_addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("Invalid bind address: {addr}"))?;

        let listener = TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("Failed to bind to {addr}"))?;

        log::info!("[Api] Listening on {}", addr);
        self.serve(listener, shutdown_signal).await
    }

    /// Serves on an already bound listener until `shutdown_signal` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let app = create_router(Arc::clone(&self.state));

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .context("Server error")?;

        log::warn!("[Api] Server shut down");
        Ok(())
    }
}
