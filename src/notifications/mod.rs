//! Web push delivery infrastructure.
//!
//! Manages the hub's VAPID keys and the transport that delivers encrypted
//! web push messages (RFC 8030) to browser push services.
//!
//! # Architecture
//!
//! ```text
//! Operator triggers send-notification
//!     ↓
//! Dispatcher fans out over the registry snapshot
//!     ↓
//! PushSender encrypts (RFC 8291) and signs (RFC 8292) each message
//!     ↓
//! Push service delivers to the browser's service worker
//! ```
//!
//! # VAPID Keys
//!
//! The hub owns one P-256 ECDSA keypair. The public key is handed to
//! browsers as the `applicationServerKey` when they subscribe; the private
//! key signs the VAPID JWT on every push request.

// Rust guideline compliant 2026-02

pub mod push;
pub mod vapid;
