//! Client configuration for talking to a bookmark server.
//!
//! Front ends resolve where the file lives; this module only owns the shape,
//! defaults and validation of the values.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 500;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SYNC_INTERVAL_MINS: u64 = 60;
/// Periodic syncs never run more often than this.
pub const MIN_SYNC_INTERVAL_MINS: u64 = 15;

/// Persisted client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: Option<String>,
    /// Bearer token; `READMARK_TOKEN` takes precedence when set
    pub api_token: Option<String>,
    pub page_size: usize,
    pub request_timeout_secs: u64,
    pub sync_interval_mins: u64,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            api_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            sync_interval_mins: DEFAULT_SYNC_INTERVAL_MINS,
            retry: RetryConfig::default(),
        }
    }
}

/// Backoff settings for retrying transient sync failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_secs: 2,
            max_delay_secs: 300,
            backoff_factor: 2.0,
        }
    }
}

impl ClientConfig {
    /// Read a config file; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::InvalidInput(format!(
                "Failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.validate()
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let normalized = self.clone().validate()?;
        std::fs::write(path, serde_json::to_string_pretty(&normalized)?)?;
        Ok(())
    }

    /// Normalize text values and check ranges.
    pub fn validate(mut self) -> Result<Self> {
        self.api_token = normalize_text_option(self.api_token);
        self.server_url = match normalize_text_option(self.server_url) {
            Some(url) if is_http_url(&url) => Some(url.trim_end_matches('/').to_string()),
            Some(url) => {
                return Err(Error::InvalidInput(format!(
                    "server_url must include http:// or https://: {url}"
                )))
            }
            None => None,
        };

        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::InvalidInput(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.sync_interval_mins < MIN_SYNC_INTERVAL_MINS {
            return Err(Error::InvalidInput(format!(
                "sync_interval_mins must be at least {MIN_SYNC_INTERVAL_MINS}"
            )));
        }
        if self.retry.backoff_factor < 1.0 || !self.retry.backoff_factor.is_finite() {
            return Err(Error::InvalidInput(
                "retry.backoff_factor must be a finite number >= 1".to_string(),
            ));
        }
        if self.retry.base_delay_secs > self.retry.max_delay_secs {
            return Err(Error::InvalidInput(
                "retry.base_delay_secs must not exceed retry.max_delay_secs".to_string(),
            ));
        }
        Ok(self)
    }

    /// Prefer an explicit token (usually from the environment) over the stored one.
    pub fn resolve_token(&self, override_token: Option<String>) -> Option<String> {
        normalize_text_option(override_token).or_else(|| self.api_token.clone())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_mins * 60)
    }
}
