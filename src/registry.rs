//! Push subscription registry.
//!
//! Holds every browser push subscription the hub knows about, keyed by
//! push endpoint. A browser that re-registers with the same endpoint
//! replaces its previous record (rotated keys win), so there is never more
//! than one record per endpoint.
//!
//! # Dispatch rounds
//!
//! Every mutation stamps the touched records with a new revision. A dispatch
//! round takes a [`RoundSnapshot`] and later commits its still-valid set with
//! [`Registry::commit_round`]. Records stamped after the snapshot watermark
//! (registrations that landed while the round was sending) survive the
//! commit, and records removed mid-round stay removed.
//!
//! ```text
//! snapshot() ──► send to each record (no lock held) ──► commit_round(watermark, still_valid)
//!     ▲                                                        │
//!     └──────────── upsert() may land here, kept ──────────────┘
//! ```

// Rust guideline compliant 2026-02

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::constants::ENDPOINT_DISPLAY_LEN;

/// Client key material for payload encryption.
///
/// Opaque to the hub; passed through unmodified to the push transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Browser's P-256 ECDH public key (base64url).
    pub p256dh: String,
    /// Shared auth secret (base64url).
    pub auth: String,
}

/// A browser's registered push destination.
///
/// Mirrors the shape of `PushSubscription.toJSON()` in the browser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Push service endpoint URL. Natural key of the record.
    pub endpoint: String,
    /// Advisory expiration time (epoch milliseconds, may be fractional), usually null.
    #[serde(rename = "expirationTime", alias = "expiration", default)]
    pub expiration: Option<f64>,
    /// Client public key material.
    pub keys: SubscriptionKeys,
}

impl SubscriptionRecord {
    /// Build a record without an expiration time.
    pub fn new(
        endpoint: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            expiration: None,
            keys: SubscriptionKeys {
                p256dh: p256dh.into(),
                auth: auth.into(),
            },
        }
    }

    /// Endpoint shortened for logs and API responses.
    pub fn display_endpoint(&self) -> String {
        truncate_endpoint(&self.endpoint)
    }
}

/// Shorten an endpoint URL so full push capability URLs don't end up in logs.
pub fn truncate_endpoint(endpoint: &str) -> String {
    match endpoint.char_indices().nth(ENDPOINT_DISPLAY_LEN) {
        Some((idx, _)) => format!("{}...", &endpoint[..idx]),
        None => endpoint.to_string(),
    }
}

/// Errors returned by registry mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The record cannot be stored (e.g. empty endpoint).
    #[error("invalid subscription record: {0}")]
    InvalidRecord(String),
}

/// Records visible to a dispatch round, plus the revision they were read at.
#[derive(Clone, Debug)]
pub struct RoundSnapshot {
    /// Records in insertion order.
    pub records: Vec<SubscriptionRecord>,
    /// Highest revision issued when the snapshot was taken.
    pub watermark: u64,
}

#[derive(Debug)]
struct Entry {
    record: SubscriptionRecord,
    revision: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    revision: u64,
}

impl Inner {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn position(&self, endpoint: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.record.endpoint == endpoint)
    }
}

/// In-memory subscription registry.
///
/// Shared between request handlers behind an `Arc`. All mutations are
/// serialized by a single lock that is never held across network I/O.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves the last committed state in place;
    // keep serving it rather than poisoning every later request.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a subscription, or replace the one with the same endpoint.
    ///
    /// Returns `true` if the endpoint was not registered before.
    pub fn upsert(&self, record: SubscriptionRecord) -> Result<bool, RegistryError> {
        validate(&record)?;

        let mut inner = self.write();
        let revision = inner.next_revision();
        match inner.position(&record.endpoint) {
            Some(idx) => {
                log::info!(
                    "[Registry] Refreshed subscription {}",
                    record.display_endpoint()
                );
                inner.entries[idx] = Entry { record, revision };
                Ok(false)
            }
            None => {
                log::info!("[Registry] Saved subscription {}", record.display_endpoint());
                inner.entries.push(Entry { record, revision });
                Ok(true)
            }
        }
    }

    /// Remove the subscription for `endpoint`. Returns whether one was removed.
    pub fn remove(&self, endpoint: &str) -> bool {
        let mut inner = self.write();
        match inner.position(endpoint) {
            Some(idx) => {
                inner.entries.remove(idx);
                inner.next_revision();
                log::info!("[Registry] Removed subscription {}", truncate_endpoint(endpoint));
                true
            }
            None => false,
        }
    }

    /// Copy of all subscriptions in insertion order.
    pub fn list(&self) -> Vec<SubscriptionRecord> {
        self.read()
            .entries
            .iter()
            .map(|e| e.record.clone())
            .collect()
    }

    /// Number of stored subscriptions.
    pub fn count(&self) -> usize {
        self.read().entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Look up the subscription for `endpoint`.
    pub fn get(&self, endpoint: &str) -> Option<SubscriptionRecord> {
        let inner = self.read();
        inner.position(endpoint).map(|idx| inner.entries[idx].record.clone())
    }

    /// Atomically replace the whole collection.
    ///
    /// Duplicate endpoints in `records` collapse to the last occurrence, kept
    /// at the position of the first. Nothing is changed if any record is invalid.
    pub fn replace_all(&self, records: Vec<SubscriptionRecord>) -> Result<(), RegistryError> {
        records.iter().try_for_each(validate)?;

        let mut deduped: Vec<SubscriptionRecord> = Vec::with_capacity(records.len());
        for record in records {
            match deduped.iter().position(|r| r.endpoint == record.endpoint) {
                Some(idx) => deduped[idx] = record,
                None => deduped.push(record),
            }
        }

        let mut inner = self.write();
        let revision = inner.next_revision();
        inner.entries = deduped
            .into_iter()
            .map(|record| Entry { record, revision })
            .collect();
        Ok(())
    }

    /// Remove every subscription. Returns how many there were.
    pub fn clear(&self) -> usize {
        let mut inner = self.write();
        let previous = inner.entries.len();
        inner.entries.clear();
        inner.next_revision();
        log::info!("[Registry] Cleared {} subscription(s)", previous);
        previous
    }

    /// Take the snapshot a dispatch round sends to.
    pub fn snapshot(&self) -> RoundSnapshot {
        let inner = self.read();
        RoundSnapshot {
            records: inner.entries.iter().map(|e| e.record.clone()).collect(),
            watermark: inner.revision,
        }
    }

    /// Commit the outcome of a dispatch round.
    ///
    /// Keeps records whose endpoint is in `still_valid` and every record
    /// written after `watermark`. Everything else from the round's snapshot
    /// is pruned. Returns the number of subscriptions after the commit.
    pub fn commit_round(&self, watermark: u64, still_valid: &[SubscriptionRecord]) -> usize {
        let valid: HashSet<&str> = still_valid.iter().map(|r| r.endpoint.as_str()).collect();

        let mut inner = self.write();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|e| e.revision > watermark || valid.contains(e.record.endpoint.as_str()));
        let after = inner.entries.len();
        if after != before {
            inner.next_revision();
            log::info!("[Registry] Pruned {} subscription(s)", before - after);
        }
        after
    }
}

fn validate(record: &SubscriptionRecord) -> Result<(), RegistryError> {
    if record.endpoint.is_empty() {
        return Err(RegistryError::InvalidRecord(
            "endpoint must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(endpoint: &str, p256dh: &str, auth: &str) -> SubscriptionRecord {
        SubscriptionRecord::new(endpoint, p256dh, auth)
    }

    fn endpoints(records: &[SubscriptionRecord]) -> Vec<&str> {
        records.iter().map(|r| r.endpoint.as_str()).collect()
    }

    #[test]
    fn test_upsert_replaces_keys_for_same_endpoint() {
        let registry = Registry::new();

        assert!(registry.upsert(record("E1", "a", "b")).unwrap());
        assert_eq!(registry.count(), 1);

        assert!(!registry.upsert(record("E1", "c", "d")).unwrap());
        assert_eq!(registry.count(), 1);

        let stored = registry.get("E1").expect("E1 should be stored");
        assert_eq!(stored.keys.p256dh, "c");
        assert_eq!(stored.keys.auth, "d");
    }

    #[test]
    fn test_upsert_keeps_one_record_per_endpoint() {
        let registry = Registry::new();
        for (i, endpoint) in ["E1", "E2", "E1", "E3", "E2", "E1"].iter().enumerate() {
            registry
                .upsert(record(endpoint, &format!("k{i}"), "auth"))
                .unwrap();
        }

        let listed = registry.list();
        assert_eq!(endpoints(&listed), vec!["E1", "E2", "E3"]);
        assert_eq!(listed[0].keys.p256dh, "k5");
    }

    #[test]
    fn test_upsert_rejects_empty_endpoint() {
        let registry = Registry::new();
        let err = registry.upsert(record("", "a", "b")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRecord(_)));

        assert!(registry.upsert(record("   ", "a", "b")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = Registry::new();
        registry.upsert(record("E1", "a", "b")).unwrap();

        assert!(!registry.remove("missing"));
        assert_eq!(registry.count(), 1);

        assert!(registry.remove("E1"));
        assert!(!registry.remove("E1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_returns_detached_copy() {
        let registry = Registry::new();
        registry.upsert(record("E1", "a", "b")).unwrap();

        let mut listed = registry.list();
        listed.clear();
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_clear_empties_registry() {
        let registry = Registry::new();
        registry.upsert(record("E1", "a", "b")).unwrap();
        registry.upsert(record("E2", "a", "b")).unwrap();

        assert_eq!(registry.clear(), 2);
        assert!(registry.list().is_empty());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_replace_all_collapses_duplicates() {
        let registry = Registry::new();
        registry.upsert(record("old", "a", "b")).unwrap();

        registry
            .replace_all(vec![
                record("E1", "a", "b"),
                record("E2", "a", "b"),
                record("E1", "c", "d"),
            ])
            .unwrap();

        let listed = registry.list();
        assert_eq!(endpoints(&listed), vec!["E1", "E2"]);
        assert_eq!(listed[0].keys.p256dh, "c");
    }

    #[test]
    fn test_replace_all_rejects_invalid_without_changes() {
        let registry = Registry::new();
        registry.upsert(record("E1", "a", "b")).unwrap();

        let result = registry.replace_all(vec![record("E2", "a", "b"), record("", "a", "b")]);
        assert!(result.is_err());
        assert_eq!(endpoints(&registry.list()), vec!["E1"]);
    }

    #[test]
    fn test_commit_round_prunes_failed_records() {
        let registry = Registry::new();
        registry.upsert(record("E1", "a", "b")).unwrap();
        registry.upsert(record("E2", "a", "b")).unwrap();

        let snapshot = registry.snapshot();
        let still_valid = vec![snapshot.records[0].clone()];

        assert_eq!(registry.commit_round(snapshot.watermark, &still_valid), 1);
        assert_eq!(endpoints(&registry.list()), vec!["E1"]);
    }

    #[test]
    fn test_commit_round_keeps_mid_round_registrations() {
        let registry = Registry::new();
        registry.upsert(record("E1", "a", "b")).unwrap();
        registry.upsert(record("E2", "a", "b")).unwrap();

        let snapshot = registry.snapshot();

        // Lands while the round is sending
        registry.upsert(record("E3", "a", "b")).unwrap();
        // E2 re-registers with fresh keys mid-round
        registry.upsert(record("E2", "new", "new")).unwrap();

        registry.commit_round(snapshot.watermark, &[]);

        let listed = registry.list();
        assert_eq!(endpoints(&listed), vec!["E2", "E3"]);
        assert_eq!(listed[0].keys.p256dh, "new");
    }

    #[test]
    fn test_commit_round_does_not_resurrect_removed_records() {
        let registry = Registry::new();
        registry.upsert(record("E1", "a", "b")).unwrap();

        let snapshot = registry.snapshot();
        registry.clear();

        registry.commit_round(snapshot.watermark, &snapshot.records);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_replace_all_is_atomic_for_readers() {
        let registry = Arc::new(Registry::new());
        registry
            .replace_all(vec![record("E1", "a", "b"), record("E2", "a", "b")])
            .unwrap();

        let writer = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for i in 0..500 {
                    registry
                        .replace_all(vec![
                            record(&format!("A{i}"), "a", "b"),
                            record(&format!("B{i}"), "a", "b"),
                        ])
                        .unwrap();
                }
            })
        };

        for _ in 0..500 {
            assert_eq!(registry.list().len(), 2);
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_truncate_endpoint() {
        assert_eq!(truncate_endpoint("short"), "short");

        let long = format!("https://push.example.com/{}", "x".repeat(80));
        let truncated = truncate_endpoint(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), ENDPOINT_DISPLAY_LEN + 3);
    }

    #[test]
    fn test_record_deserializes_browser_json() {
        let json = r#"{
            "endpoint": "https://fcm.googleapis.com/fcm/send/abc",
            "expirationTime": null,
            "keys": { "p256dh": "BPk", "auth": "xyz" }
        }"#;
        let record: SubscriptionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.endpoint, "https://fcm.googleapis.com/fcm/send/abc");
        assert_eq!(record.expiration, None);
        assert_eq!(record.keys.auth, "xyz");

        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("expirationTime").is_some());
    }

    #[test]
    fn test_fractional_expiration_passes_through() {
        let json = r#"{
            "endpoint": "https://updates.push.services.mozilla.com/wpush/v2/abc",
            "expirationTime": 1700000000000.5,
            "keys": { "p256dh": "BPk", "auth": "xyz" }
        }"#;
        let record: SubscriptionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.expiration, Some(1_700_000_000_000.5));

        let registry = Registry::new();
        registry.upsert(record).unwrap();
        let stored = &registry.list()[0];
        let value = serde_json::to_value(stored).unwrap();
        assert_eq!(value["expirationTime"], 1_700_000_000_000.5);
    }

    #[test]
    fn test_only_empty_endpoint_is_invalid() {
        let registry = Registry::new();
        assert!(registry.upsert(record("", "a", "b")).is_err());
        assert!(registry.upsert(record(" ", "a", "b")).unwrap());
        assert_eq!(registry.count(), 1);
    }
}
