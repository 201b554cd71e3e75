//! Application-wide constants for push-hub.
//!
//! Defaults for configuration values live here so `Config::default()` and
//! the tests agree on them.
//!
//! # Categories
//!
//! - **Delivery**: push send timeouts, concurrency and TTL
//! - **Server**: bind address and VAPID subject
//! - **Display**: log/response formatting

// Rust guideline compliant 2026-02

use std::time::Duration;

// ============================================================================
// Delivery
// ============================================================================

/// Per-send timeout for a single push service request.
///
/// A hung push service must not stall the rest of a dispatch round.
/// Timeouts are classified like any other non-410 failure.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of push requests in flight during one dispatch round.
pub const MAX_CONCURRENT_SENDS: usize = 8;

/// How long the push service should hold an undelivered message (seconds).
pub const PUSH_TTL_SECS: u32 = 86_400;

/// Push service status codes that mean the subscription is gone for good.
pub const TERMINAL_STATUS_CODES: [u16; 2] = [404, 410];

// ============================================================================
// Server
// ============================================================================

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";

/// Default VAPID `sub` claim (RFC 8292 contact URI).
pub const DEFAULT_VAPID_SUBJECT: &str = "mailto:admin@localhost";

// ============================================================================
// Display
// ============================================================================

/// Number of endpoint characters kept when logging or echoing an endpoint.
pub const ENDPOINT_DISPLAY_LEN: usize = 50;
