//! Runtime environment detection.
//!
//! Provides a single source of truth for determining the runtime environment
//! (test, development, production) based on the `PUSH_HUB_ENV` environment variable.
//!
//! # Environment Variable
//!
//! Set `PUSH_HUB_ENV` to one of:
//! - `test` - Test mode (config and VAPID keys live under the repo's `tmp/`)
//! - `development` or `dev` - Development mode (debug logging by default)
//! - (anything else or unset) - Production mode

// Rust guideline compliant 2026-02

/// Runtime environment for the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Production environment (default).
    Production,
    /// Development environment.
    Development,
    /// Test environment.
    Test,
}

impl Environment {
    /// Detect current environment from `PUSH_HUB_ENV`.
    #[must_use]
    pub fn current() -> Self {
        Self::parse(std::env::var("PUSH_HUB_ENV").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("test") => Self::Test,
            Some("development") | Some("dev") => Self::Development,
            _ => Self::Production,
        }
    }

    /// Returns `true` if this is the test environment.
    #[must_use]
    pub fn is_test(self) -> bool {
        self == Self::Test
    }

    /// Log filter used when `RUST_LOG` is not set.
    #[must_use]
    pub fn default_log_filter(self) -> &'static str {
        match self {
            Self::Production => "info",
            Self::Development => "debug",
            Self::Test => "warn",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Development => write!(f, "development"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Convenience function to check if running in test mode.
#[must_use]
pub fn is_test_mode() -> bool {
    Environment::current().is_test()
}
