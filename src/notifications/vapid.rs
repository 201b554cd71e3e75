//! VAPID key management for Web Push (RFC 8292).
//!
//! Generates P-256 ECDSA keypairs and keeps the hub's pair in
//! `<config_dir>/vapid.json` (owner read/write only). Keys can also be
//! supplied through `PUSH_HUB_VAPID_PUBLIC_KEY` / `PUSH_HUB_VAPID_PRIVATE_KEY`.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::OsRng;
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::Path};

/// File name of the persisted keypair inside the config directory.
pub const VAPID_KEYS_FILE: &str = "vapid.json";

/// VAPID keypair for web push authentication.
///
/// The private key is the raw 32-byte P-256 scalar (base64url), which is the
/// format `web_push::VapidSignatureBuilder::from_base64()` expects. The public
/// key is the uncompressed SEC1 point (65 bytes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VapidKeys {
    /// Raw 32-byte P-256 private key scalar (base64url).
    private_key_b64: String,
    /// Uncompressed public key bytes (base64url, 65 bytes decoded).
    public_key_b64: String,
}

impl VapidKeys {
    /// Generate a fresh VAPID keypair.
    pub fn generate() -> Result<Self> {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        // SEC1 uncompressed public key (65 bytes: 0x04 || x || y)
        let public_bytes = verifying_key.to_encoded_point(false);
        let public_key_b64 = BASE64URL.encode(public_bytes.as_bytes());
        let private_key_b64 = BASE64URL.encode(signing_key.to_bytes().as_slice());

        Ok(Self {
            private_key_b64,
            public_key_b64,
        })
    }

    /// Base64url-encoded uncompressed public key.
    ///
    /// Browsers pass this as `applicationServerKey` to `pushManager.subscribe()`.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key_b64
    }

    /// Base64url-encoded raw 32-byte private key scalar.
    pub fn private_key_base64url(&self) -> &str {
        &self.private_key_b64
    }

    /// Reconstruct from base64url-encoded strings, validating both halves.
    pub fn from_base64url(public_key_b64: &str, private_key_b64: &str) -> Result<Self> {
        let pub_bytes = BASE64URL
            .decode(public_key_b64)
            .context("Invalid base64url for VAPID public key")?;
        anyhow::ensure!(
            pub_bytes.len() == 65 && pub_bytes[0] == 0x04,
            "VAPID public key must be 65-byte uncompressed P-256 point"
        );

        let priv_bytes = BASE64URL
            .decode(private_key_b64)
            .context("Invalid base64url for VAPID private key")?;
        anyhow::ensure!(
            priv_bytes.len() == 32,
            "VAPID private key must be 32-byte P-256 scalar, got {} bytes",
            priv_bytes.len()
        );
        let signing_key = SigningKey::from_bytes(priv_bytes.as_slice().into())
            .context("VAPID private key is not a valid P-256 scalar")?;

        let derived = signing_key.verifying_key().to_encoded_point(false);
        anyhow::ensure!(
            derived.as_bytes() == pub_bytes.as_slice(),
            "VAPID public key does not match private key"
        );

        Ok(Self {
            private_key_b64: private_key_b64.to_string(),
            public_key_b64: public_key_b64.to_string(),
        })
    }

    /// Load the keypair from `dir`, generating and saving one on first run.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(VAPID_KEYS_FILE);

        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read VAPID keys from {}", path.display()))?;
            let stored: Self =
                serde_json::from_str(&content).context("Failed to parse VAPID keys file")?;
            // Re-validate so a hand-edited file fails at startup, not on first send
            return Self::from_base64url(&stored.public_key_b64, &stored.private_key_b64);
        }

        let keys = Self::generate()?;
        fs::create_dir_all(dir)?;
        fs::write(&path, serde_json::to_string_pretty(&keys)?)
            .with_context(|| format!("Failed to write VAPID keys to {}", path.display()))?;

        #[cfg(unix)]
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .context("Failed to set VAPID keys file permissions")?;

        log::info!("[WebPush] Generated new VAPID keypair at {}", path.display());
        Ok(keys)
    }

    /// Keys from `PUSH_HUB_VAPID_PUBLIC_KEY` / `PUSH_HUB_VAPID_PRIVATE_KEY`, if both are set.
    pub fn from_env() -> Option<Result<Self>> {
        let public = std::env::var("PUSH_HUB_VAPID_PUBLIC_KEY").ok()?;
        let private = std::env::var("PUSH_HUB_VAPID_PRIVATE_KEY").ok()?;
        Some(Self::from_base64url(&public, &private))
    }

    /// Uncompressed public key bytes (65 bytes).
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        BASE64URL
            .decode(&self.public_key_b64)
            .context("Failed to decode VAPID public key")
    }
}
