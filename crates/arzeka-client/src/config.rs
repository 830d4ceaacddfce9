//! Client configuration
//!
//! Precedence: env vars > config file > defaults. Credentials are never part
//! of the file; they are passed to `authenticate()` at runtime.

use std::path::Path;
use std::time::Duration;

use arzeka_auth::{BASE_URL, DEFAULT_EXPIRY_MARGIN};
use serde::Deserialize;

/// Env var overriding `base_url`
pub const BASE_URL_ENV: &str = "ARZEKA_BASE_URL";

/// Connection and renewal settings for an `ArzekaClient`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Retries on 429/5xx and connection errors (0 disables)
    pub max_retries: u32,
    /// Base backoff, doubled on each retry
    pub retry_backoff_ms: u64,
    pub expiry_margin_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 1000,
            expiry_margin_secs: DEFAULT_EXPIRY_MARGIN.as_secs(),
        }
    }
}

impl ClientConfig {
    /// Defaults pointed at another gateway root.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file, then overlay `ARZEKA_BASE_URL`.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: ClientConfig = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            config.base_url = url;
        }
        config.base_url = normalize_base_url(&config.base_url);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> common::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn expiry_margin(&self) -> Duration {
        Duration::from_secs(self.expiry_margin_secs)
    }
}

fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim().trim_end_matches('/'))
}
