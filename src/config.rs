//! Configuration loading and persistence.
//!
//! Settings are read from `<config_dir>/config.json` (defaults when the
//! file is absent) and then overridden from `PUSH_HUB_*` environment
//! variables. VAPID keys are kept separately in `<config_dir>/vapid.json`.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{fs, path::Path, path::PathBuf};

use crate::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_VAPID_SUBJECT, MAX_CONCURRENT_SENDS, PUSH_TTL_SECS, SEND_TIMEOUT,
};
use crate::dispatch::{DispatchOptions, PayloadPolicy, PrunePolicy};
use crate::notifications::vapid::VapidKeys;

/// Configuration for the push hub.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP API listens on.
    pub bind_address: String,
    /// VAPID `sub` claim (a `mailto:` or `https:` contact URI).
    pub vapid_subject: String,
    /// Timeout in seconds for a single push send.
    pub send_timeout_secs: u64,
    /// Maximum number of push sends in flight during a round.
    pub max_concurrent_sends: usize,
    /// Seconds the push service should retain an undelivered message.
    pub push_ttl_secs: u32,
    /// Handling of notifications with neither title nor body.
    pub payload_policy: PayloadPolicy,
    /// Which failed sends prune a subscription.
    pub prune_policy: PrunePolicy,
    /// Whether to answer cross-origin requests (browser pages on other origins).
    pub cors_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            vapid_subject: DEFAULT_VAPID_SUBJECT.to_string(),
            send_timeout_secs: SEND_TIMEOUT.as_secs(),
            max_concurrent_sends: MAX_CONCURRENT_SENDS,
            push_ttl_secs: PUSH_TTL_SECS,
            payload_policy: PayloadPolicy::default(),
            prune_policy: PrunePolicy::default(),
            cors_enabled: true,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `PUSH_HUB_CONFIG_DIR` env var: explicit override
    /// 2. `PUSH_HUB_ENV=test`: `tmp/push-hub-test` under the crate root
    /// 3. Default: platform config dir (Linux: ~/.config/push-hub)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("PUSH_HUB_CONFIG_DIR") {
            PathBuf::from(dir)
        } else if crate::env::is_test_mode() {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/push-hub-test")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("push-hub")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from the config directory, with environment overrides.
    pub fn load() -> Result<Self> {
        let dir = Self::config_dir()?;
        let mut config = Self::load_from_dir(&dir)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Reads `config.json` from `dir`, falling back to defaults when it does not exist.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join("config.json");
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = var("PUSH_HUB_BIND") {
            self.bind_address = bind;
        }

        if let Some(subject) = var("PUSH_HUB_VAPID_SUBJECT") {
            self.vapid_subject = subject;
        }

        if let Some(timeout) = var("PUSH_HUB_SEND_TIMEOUT") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.send_timeout_secs = secs;
            }
        }

        if let Some(max) = var("PUSH_HUB_MAX_CONCURRENT_SENDS") {
            if let Ok(max) = max.parse::<usize>() {
                self.max_concurrent_sends = max;
            }
        }

        if let Some(ttl) = var("PUSH_HUB_PUSH_TTL") {
            if let Ok(ttl) = ttl.parse::<u32>() {
                self.push_ttl_secs = ttl;
            }
        }

        // Policies change delivery semantics, so a typo is an error rather than a silent default
        if let Some(policy) = var("PUSH_HUB_PAYLOAD_POLICY") {
            self.payload_policy = policy.parse().context("Invalid PUSH_HUB_PAYLOAD_POLICY")?;
        }

        if let Some(policy) = var("PUSH_HUB_PRUNE_POLICY") {
            self.prune_policy = policy.parse().context("Invalid PUSH_HUB_PRUNE_POLICY")?;
        }

        Ok(())
    }

    /// Persists the current configuration to `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let config_path = dir.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Per-send timeout as a `Duration`.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    /// Dispatcher options derived from this configuration.
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            payload_policy: self.payload_policy,
            prune_policy: self.prune_policy,
            send_timeout: self.send_timeout(),
            max_concurrent_sends: self.max_concurrent_sends.max(1),
        }
    }

    /// VAPID keys from the environment, or from (or newly created in) `dir`.
    pub fn vapid_keys(dir: &Path) -> Result<VapidKeys> {
        if let Some(keys) = VapidKeys::from_env() {
            return keys.context("Invalid VAPID keys in PUSH_HUB_VAPID_* environment variables");
        }
        VapidKeys::load_or_create(dir)
    }
}
