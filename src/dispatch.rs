//! Delivery dispatcher.
//!
//! One dispatch round sends a notification to every subscription in the
//! registry, records a [`DeliveryOutcome`] per subscription, and commits the
//! subscriptions that are still valid back to the registry. A failed send
//! never aborts the round; only a payload that cannot be built does, and in
//! that case the registry is left untouched.

// Rust guideline compliant 2026-02

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::constants::{MAX_CONCURRENT_SENDS, SEND_TIMEOUT};
use crate::notifications::push::{PushSender, SendFailure};
use crate::registry::{Registry, SubscriptionRecord};

/// How to treat a notification with neither title nor body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadPolicy {
    /// Send whatever is given, even an empty notification.
    #[default]
    Permissive,
    /// Reject a notification whose title and body are both empty.
    Strict,
}

/// Which failed sends remove a subscription from the registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrunePolicy {
    /// Any failed send drops the subscription.
    #[default]
    AnyFailure,
    /// Only 404/410 drop the subscription; transient failures are kept.
    TerminalOnly,
}

impl std::str::FromStr for PayloadPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => anyhow::bail!("unknown payload policy '{other}' (expected permissive|strict)"),
        }
    }
}

impl std::str::FromStr for PrunePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any-failure" => Ok(Self::AnyFailure),
            "terminal-only" => Ok(Self::TerminalOnly),
            other => {
                anyhow::bail!("unknown prune policy '{other}' (expected any-failure|terminal-only)")
            }
        }
    }
}

/// Tunables for a dispatch round.
#[derive(Clone, Debug)]
pub struct DispatchOptions {
    /// Empty-notification handling.
    pub payload_policy: PayloadPolicy,
    /// Failure pruning rule.
    pub prune_policy: PrunePolicy,
    /// Timeout applied to each individual send.
    pub send_timeout: Duration,
    /// Maximum sends in flight at once.
    pub max_concurrent_sends: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            payload_policy: PayloadPolicy::default(),
            prune_policy: PrunePolicy::default(),
            send_timeout: SEND_TIMEOUT,
            max_concurrent_sends: MAX_CONCURRENT_SENDS,
        }
    }
}

/// Notification content pushed to every subscription.
///
/// Serialized as `{"title": ..., "body": ...}`; absent fields are omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Notification body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Notification {
    /// Build a notification with both fields set.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            body: Some(body.into()),
        }
    }

    /// Whether neither title nor body carries any text.
    pub fn is_empty(&self) -> bool {
        let blank = |field: &Option<String>| field.as_deref().map_or(true, str::is_empty);
        blank(&self.title) && blank(&self.body)
    }
}

/// Result of one send attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// The push service accepted the message.
    Success,
    /// The send failed; see the outcome's `error`.
    Failure,
}

/// Outcome of delivering to one subscription.
#[derive(Clone, Debug, Serialize)]
pub struct DeliveryOutcome {
    /// Whether the send succeeded.
    pub status: DeliveryStatus,
    /// Subscription the send targeted.
    pub subscription: SubscriptionRecord,
    /// Failure detail, present only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SendFailure>,
}

/// Summary of a dispatch round.
#[derive(Clone, Debug)]
pub struct DispatchReport {
    /// One outcome per subscription, in registry order.
    pub outcomes: Vec<DeliveryOutcome>,
    /// Number of successful sends.
    pub success_count: usize,
    /// Number of round subscriptions kept after pruning.
    pub valid_count: usize,
    /// Number of subscriptions the round processed.
    pub total: usize,
}

/// Errors that abort a dispatch round before anything is sent.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Rejected by [`PayloadPolicy::Strict`].
    #[error("notification needs a title or a body")]
    InvalidPayload,
    /// The payload could not be serialized.
    #[error("failed to serialize notification payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Fans notifications out to every registered subscription.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    sender: Arc<dyn PushSender>,
    options: DispatchOptions,
}

impl Dispatcher {
    /// Create a dispatcher delivering through `sender`.
    pub fn new(
        registry: Arc<Registry>,
        sender: Arc<dyn PushSender>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            registry,
            sender,
            options,
        }
    }

    /// Options this dispatcher runs with.
    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Run one dispatch round.
    pub async fn dispatch(
        &self,
        notification: &Notification,
    ) -> Result<DispatchReport, DispatchError> {
        if self.options.payload_policy == PayloadPolicy::Strict && notification.is_empty() {
            return Err(DispatchError::InvalidPayload);
        }
        let payload = serde_json::to_vec(notification)?;

        let snapshot = self.registry.snapshot();
        let total = snapshot.records.len();
        log::info!("[Dispatch] Sending notification to {} subscription(s)", total);

        let payload = payload.as_slice();
        let results: Vec<(SubscriptionRecord, Result<(), SendFailure>)> =
            stream::iter(snapshot.records)
                .map(move |record| async move {
                    let result = self.send_one(&record, payload).await;
                    (record, result)
                })
                .buffered(self.options.max_concurrent_sends.max(1))
                .collect()
                .await;

        let mut outcomes = Vec::with_capacity(total);
        let mut still_valid = Vec::with_capacity(total);
        let mut success_count = 0;

        for (record, result) in results {
            match result {
                Ok(()) => {
                    success_count += 1;
                    still_valid.push(record.clone());
                    outcomes.push(DeliveryOutcome {
                        status: DeliveryStatus::Success,
                        subscription: record,
                        error: None,
                    });
                }
                Err(failure) => {
                    if self.retains_after(&failure) {
                        still_valid.push(record.clone());
                    } else {
                        log::info!(
                            "[Dispatch] Removing subscription {} ({})",
                            record.display_endpoint(),
                            failure
                        );
                    }
                    outcomes.push(DeliveryOutcome {
                        status: DeliveryStatus::Failure,
                        subscription: record,
                        error: Some(failure),
                    });
                }
            }
        }

        let valid_count = still_valid.len();
        let remaining = self.registry.commit_round(snapshot.watermark, &still_valid);
        log::info!(
            "[Dispatch] Round complete: {}/{} delivered, {} subscription(s) registered",
            success_count,
            total,
            remaining
        );

        Ok(DispatchReport {
            outcomes,
            success_count,
            valid_count,
            total,
        })
    }

    async fn send_one(
        &self,
        record: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<(), SendFailure> {
        let send = self.sender.send(record, payload);
        match tokio::time::timeout(self.options.send_timeout, send).await {
            Ok(result) => result,
            Err(_elapsed) => {
                log::warn!("[Dispatch] Send to {} timed out", record.display_endpoint());
                Err(SendFailure::timeout(self.options.send_timeout))
            }
        }
    }

    fn retains_after(&self, failure: &SendFailure) -> bool {
        match self.options.prune_policy {
            PrunePolicy::AnyFailure => false,
            PrunePolicy::TerminalOnly => !failure.is_terminal(),
        }
    }
}
