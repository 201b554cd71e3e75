//! Push Hub - browser push notification server.
//!
//! Browsers register their push subscriptions over HTTP; an operator
//! triggers a send and the hub fans the notification out to every stored
//! subscription, pruning the ones the push service reports as dead.
//!
//! # Architecture
//!
//! - **Registry** - In-memory subscription set, one record per endpoint
//! - **Dispatcher** - Fan-out with per-send timeout and failure isolation
//! - **Notifications** - Web push transport and VAPID keys
//! - **Api** - axum HTTP adapter; `AppState` is the composition root
//!
//! # Modules
//!
//! - [`registry`] - Subscription storage and dispatch-round commits
//! - [`dispatch`] - Delivery rounds and outcome reporting
//! - [`notifications`] - `PushSender` trait, web push sender, VAPID keys
//! - [`api`] - HTTP routes and handlers
//! - [`config`] - Configuration loading/saving

// Rust guideline compliant 2026-02

pub mod api;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod env;
pub mod notifications;
pub mod registry;

// Re-export commonly used types
pub use api::{ApiServer, AppState};
pub use config::Config;
pub use dispatch::{DispatchOptions, Dispatcher, Notification, PayloadPolicy, PrunePolicy};
pub use notifications::push::{PushSender, SendFailure, WebPushSender};
pub use notifications::vapid::VapidKeys;
pub use registry::{Registry, SubscriptionKeys, SubscriptionRecord};
