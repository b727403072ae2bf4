use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::{RequestError, Result};

const ENV_BASE_URL: &str = "REQUEST_CLIENT_BASE_URL";
const ENV_TIMEOUT_MS: &str = "REQUEST_CLIENT_TIMEOUT_MS";
const ENV_RETRY_ATTEMPTS: &str = "REQUEST_CLIENT_RETRY_ATTEMPTS";
const ENV_RETRY_DELAY_MS: &str = "REQUEST_CLIENT_RETRY_DELAY_MS";

/// Construction-time client configuration.
///
/// Header names are compared case-insensitively when merged with per-call
/// headers; per-call values win.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix concatenated in front of every request path.
    pub base_url: String,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Default per-request timeout in milliseconds. Zero disables the timeout.
    pub timeout_ms: u64,
    /// Number of retries after the initial attempt for non-2xx responses.
    pub retry_attempts: usize,
    /// Base retry delay in milliseconds (linear strategy).
    pub retry_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            headers: BTreeMap::from([(
                "content-type".to_owned(),
                "application/json".to_owned(),
            )]),
            timeout_ms: 30_000,
            retry_attempts: 0,
            retry_delay_ms: 1_000,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry(mut self, attempts: usize, delay_ms: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before attempt `attempt + 1`: `retry_delay × attempt`.
    pub fn retry_delay(&self, attempt: usize) -> Duration {
        let attempt = u64::try_from(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_delay_ms.saturating_mul(attempt))
    }

    /// Builds a config from `REQUEST_CLIENT_*` environment variables.
    ///
    /// Reads:
    /// - `REQUEST_CLIENT_BASE_URL`
    /// - `REQUEST_CLIENT_TIMEOUT_MS`
    /// - `REQUEST_CLIENT_RETRY_ATTEMPTS`
    /// - `REQUEST_CLIENT_RETRY_DELAY_MS`
    ///
    /// Unset variables keep their defaults. A variable that is set but not a
    /// valid number is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url.trim().to_owned();
        }
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = parse_number(ENV_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_RETRY_ATTEMPTS) {
            config.retry_attempts = parse_number(ENV_RETRY_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_RETRY_DELAY_MS) {
            config.retry_delay_ms = parse_number(ENV_RETRY_DELAY_MS, &value)?;
        }
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        RequestError::Config(format!(
            "{name} must be a non-negative integer, got '{value}'"
        ))
    })
}
