//! Configuration for the cache layer, the counter store, and the metrics sink.
//!
//! Every struct deserializes with serde for file-based config, and
//! [`GuardConfig::from_env`] reads the same options from environment variables
//! (after loading a `.env` file if one exists).

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{GuardError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// CACHES
// ═══════════════════════════════════════════════════════════════════════════════

/// TTL and capacity of one concern cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Entry lifetime in seconds
    pub ttl_seconds: u64,
    /// Maximum number of services held
    pub capacity: usize,
}

impl CacheSettings {
    /// Creates settings with an explicit TTL and capacity.
    pub fn new(ttl_seconds: u64, capacity: usize) -> Self {
        Self {
            ttl_seconds,
            capacity,
        }
    }

    /// Defaults for the API key cache.
    pub fn api_keys() -> Self {
        Self::new(API_KEY_CACHE_TTL_SECS, DEFAULT_CACHE_CAPACITY)
    }

    /// Defaults for the permission cache.
    pub fn permissions() -> Self {
        Self::new(PERMISSION_CACHE_TTL_SECS, DEFAULT_CACHE_CAPACITY)
    }

    /// Defaults for the service active flag cache.
    pub fn service_active() -> Self {
        Self::new(SERVICE_ACTIVE_CACHE_TTL_SECS, DEFAULT_CACHE_CAPACITY)
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Settings for all three concern caches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachesConfig {
    /// API key cache
    pub api_keys: CacheSettings,
    /// Permission cache
    pub permissions: CacheSettings,
    /// Service active flag cache
    pub service_active: CacheSettings,
}

impl Default for CachesConfig {
    fn default() -> Self {
        Self {
            api_keys: CacheSettings::api_keys(),
            permissions: CacheSettings::permissions(),
            service_active: CacheSettings::service_active(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COUNTER STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// What the counter client does when the store cannot be reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and behave as a miss
    #[default]
    Open,
    /// Return the failure to the caller
    Closed,
}

impl FromStr for FailurePolicy {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "fail-open" | "fail_open" => Ok(FailurePolicy::Open),
            "closed" | "fail-closed" | "fail_closed" => Ok(FailurePolicy::Closed),
            other => Err(GuardError::ConfigError(format!(
                "unknown failure policy '{}', expected 'open' or 'closed'",
                other
            ))),
        }
    }
}

/// Distributed counter store (Redis) configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterStoreConfig {
    /// When false the client never touches the network and every read is a miss
    pub enabled: bool,
    /// Store host
    pub host: String,
    /// Store port
    pub port: u16,
    /// Timeout applied to every operation, in milliseconds
    pub timeout_ms: u64,
    /// Behavior when the store is unreachable
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for CounterStoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: DEFAULT_COUNTER_HOST.into(),
            port: DEFAULT_COUNTER_PORT,
            timeout_ms: DEFAULT_COUNTER_TIMEOUT_MS,
            failure_policy: FailurePolicy::Open,
        }
    }
}

impl CounterStoreConfig {
    /// Creates an enabled config pointing at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            enabled: true,
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Sets the failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Connection URL for the store.
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }

    /// Timeout applied to every operation.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// METRICS
// ═══════════════════════════════════════════════════════════════════════════════

/// StatsD metrics configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// When false every metric call is a no-op
    pub enabled: bool,
    /// StatsD host
    pub host: String,
    /// StatsD port
    pub port: u16,
    /// Prefix prepended to every metric name
    pub prefix: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: DEFAULT_STATSD_HOST.into(),
            port: DEFAULT_STATSD_PORT,
            prefix: DEFAULT_STATSD_PREFIX.into(),
        }
    }
}

impl MetricsConfig {
    /// Creates an enabled config pointing at `host:port`.
    pub fn new(host: impl Into<String>, port: u16, prefix: impl Into<String>) -> Self {
        Self {
            enabled: true,
            host: host.into(),
            port,
            prefix: prefix.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOP LEVEL
// ═══════════════════════════════════════════════════════════════════════════════

/// Complete configuration for the auth cache layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Distributed counter store
    #[serde(default)]
    pub counter: CounterStoreConfig,
    /// Metrics sink
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Concern caches
    #[serde(default)]
    pub caches: CachesConfig,
}

impl GuardConfig {
    /// Loads configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let caches = &defaults.caches;

        Ok(Self {
            counter: CounterStoreConfig {
                enabled: parse_var(&lookup, "REDIS_ENABLED", defaults.counter.enabled, parse_bool)?,
                host: lookup("REDIS_HOST").unwrap_or(defaults.counter.host),
                port: parse_var(&lookup, "REDIS_PORT", defaults.counter.port, from_str)?,
                timeout_ms: parse_var(&lookup, "REDIS_TIMEOUT_MS", defaults.counter.timeout_ms, from_str)?,
                failure_policy: parse_var(
                    &lookup,
                    "REDIS_FAILURE_POLICY",
                    defaults.counter.failure_policy,
                    FailurePolicy::from_str,
                )?,
            },
            metrics: MetricsConfig {
                enabled: parse_var(&lookup, "STATSD_ENABLED", defaults.metrics.enabled, parse_bool)?,
                host: lookup("STATSD_HOST").unwrap_or(defaults.metrics.host),
                port: parse_var(&lookup, "STATSD_PORT", defaults.metrics.port, from_str)?,
                prefix: lookup("STATSD_PREFIX").unwrap_or(defaults.metrics.prefix),
            },
            caches: CachesConfig {
                api_keys: CacheSettings {
                    ttl_seconds: parse_var(&lookup, "API_KEY_CACHE_TTL_SECS", caches.api_keys.ttl_seconds, from_str)?,
                    capacity: parse_var(&lookup, "API_KEY_CACHE_CAPACITY", caches.api_keys.capacity, from_str)?,
                },
                permissions: CacheSettings {
                    ttl_seconds: parse_var(&lookup, "PERMISSION_CACHE_TTL_SECS", caches.permissions.ttl_seconds, from_str)?,
                    capacity: parse_var(&lookup, "PERMISSION_CACHE_CAPACITY", caches.permissions.capacity, from_str)?,
                },
                service_active: CacheSettings {
                    ttl_seconds: parse_var(
                        &lookup,
                        "SERVICE_ACTIVE_CACHE_TTL_SECS",
                        caches.service_active.ttl_seconds,
                        from_str,
                    )?,
                    capacity: parse_var(
                        &lookup,
                        "SERVICE_ACTIVE_CACHE_CAPACITY",
                        caches.service_active.capacity,
                        from_str,
                    )?,
                },
            },
        })
    }
}

fn parse_var<F, T, P>(lookup: &F, name: &str, default: T, parse: P) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Result<T>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => parse(raw.trim()).map_err(|e| {
            let detail = match e {
                GuardError::ConfigError(msg) => msg,
                other => other.to_string(),
            };
            GuardError::ConfigError(format!("{}='{}': {}", name, raw, detail))
        }),
    }
}

fn from_str<T>(raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| GuardError::ConfigError(e.to_string()))
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(GuardError::ConfigError(format!("not a boolean: {}", other))),
    }
}
