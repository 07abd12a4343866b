//! Transport session configuration.
//!
//! [`SessionConfig`] carries the knobs a host hands to its transport:
//! timeouts, connectivity waiting, per-host connection limits and cache
//! bypass. The call pipeline itself never reads these values.
//!
//! # Environment Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `APIWIRE_REQUEST_TIMEOUT_SECS` | `request_timeout` | `30` |
//! | `APIWIRE_RESOURCE_TIMEOUT_SECS` | `resource_timeout` | `120` |
//! | `APIWIRE_MAX_CONNECTIONS_PER_HOST` | `max_connections_per_host` | `5` |
//! | `APIWIRE_WAITS_FOR_CONNECTIVITY` | `waits_for_connectivity` | `true` |

use std::time::Duration;

use thiserror::Error;

pub const REQUEST_TIMEOUT_ENV: &str = "APIWIRE_REQUEST_TIMEOUT_SECS";
pub const RESOURCE_TIMEOUT_ENV: &str = "APIWIRE_RESOURCE_TIMEOUT_SECS";
pub const MAX_CONNECTIONS_ENV: &str = "APIWIRE_MAX_CONNECTIONS_PER_HOST";
pub const WAITS_FOR_CONNECTIVITY_ENV: &str = "APIWIRE_WAITS_FOR_CONNECTIVITY";

const DEFAULT_USER_AGENT: &str = concat!("apiwire/", env!("CARGO_PKG_VERSION"));

/// How the transport treats intermediary caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Leave caching decisions to the server and intermediaries.
    UseProtocolCachePolicy,
    /// Always revalidate with the origin (`Cache-Control: no-cache`).
    #[default]
    ReloadIgnoringCache,
}

/// Configuration handed to a transport at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Budget for establishing a connection and receiving the first response.
    pub request_timeout: Duration,
    /// Budget for the whole exchange, including the body download.
    pub resource_timeout: Duration,
    /// Keep re-attempting failed connections until `resource_timeout` elapses
    /// instead of failing on the first connect error.
    pub waits_for_connectivity: bool,
    /// Maximum simultaneous in-flight requests per destination host.
    pub max_connections_per_host: usize,
    pub cache_policy: CachePolicy,
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            resource_timeout: Duration::from_secs(120),
            waits_for_connectivity: true,
            max_connections_per_host: 5,
            cache_policy: CachePolicy::ReloadIgnoringCache,
            user_agent: String::from(DEFAULT_USER_AGENT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value '{value}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl SessionConfig {
    /// Configuration for test harnesses that only talk to local mocks.
    pub fn mocked_responses_only() -> Self {
        Self {
            request_timeout: Duration::from_secs(1),
            resource_timeout: Duration::from_secs(1),
            waits_for_connectivity: false,
            ..Self::default()
        }
    }

    /// Defaults overridden by the `APIWIRE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(REQUEST_TIMEOUT_ENV) {
            config.request_timeout = parse_seconds(REQUEST_TIMEOUT_ENV, &value)?;
        }
        if let Some(value) = lookup(RESOURCE_TIMEOUT_ENV) {
            config.resource_timeout = parse_seconds(RESOURCE_TIMEOUT_ENV, &value)?;
        }
        if let Some(value) = lookup(MAX_CONNECTIONS_ENV) {
            config.max_connections_per_host = match value.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: MAX_CONNECTIONS_ENV,
                        value,
                        reason: "expected a positive integer",
                    })
                }
            };
        }
        if let Some(value) = lookup(WAITS_FOR_CONNECTIVITY_ENV) {
            config.waits_for_connectivity = parse_flag(WAITS_FOR_CONNECTIVITY_ENV, value)?;
        }

        Ok(config)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_resource_timeout(mut self, timeout: Duration) -> Self {
        self.resource_timeout = timeout;
        self
    }

    pub fn with_max_connections_per_host(mut self, limit: usize) -> Self {
        self.max_connections_per_host = limit.max(1);
        self
    }

    pub fn with_waits_for_connectivity(mut self, wait: bool) -> Self {
        self.waits_for_connectivity = wait;
        self
    }

    pub fn with_cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = cache_policy;
        self
    }
}

fn parse_seconds(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_owned(),
            reason: "expected a positive number of seconds",
        }),
    }
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value,
            reason: "expected a boolean",
        }),
    }
}
