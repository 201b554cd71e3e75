//! Application state for the API server.

// Rust guideline compliant 2026-02

use std::sync::Arc;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::notifications::push::PushSender;
use crate::registry::Registry;

/// Shared application state.
///
/// Built once by the composition root and handed to every handler.
#[derive(Debug)]
pub struct AppState {
    /// Hub configuration
    pub config: Config,
    /// Subscription registry
    pub registry: Arc<Registry>,
    /// Delivery dispatcher over `registry`; rounds run on their own task
    pub dispatcher: Arc<Dispatcher>,
    /// VAPID public key handed to subscribing browsers (base64url)
    pub vapid_public_key: String,
}

impl AppState {
    /// Creates the application state around `registry`, delivering through `sender`.
    #[must_use]
    pub fn new(
        config: Config,
        registry: Arc<Registry>,
        sender: Arc<dyn PushSender>,
        vapid_public_key: impl Into<String>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            sender,
            config.dispatch_options(),
        ));
        Self {
            config,
            registry,
            dispatcher,
            vapid_public_key: vapid_public_key.into(),
        }
    }
}
