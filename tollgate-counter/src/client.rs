//! Counter store client with enabled flag, timeout, and failure policy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use tollgate_core::config::{CounterStoreConfig, FailurePolicy};
use tollgate_core::error::{GuardError, Result};
use tollgate_core::traits::CounterBackend;
use tollgate_core::types::{CounterKey, ServiceId};

use crate::remote::RedisBackend;

/// Client for the distributed counter store.
///
/// Constructed once at start-up and shared by reference for the life of the
/// process.
///
/// # Disabled stores
///
/// A disabled client holds no backend at all, so it can never touch the
/// network. Every read returns `None` and every write is a no-op; callers
/// treat that exactly like a miss.
///
/// # Failure policy
///
/// Every operation runs under one timeout. A timeout or connection failure is
/// "store unavailable", and then:
///
/// - [`FailurePolicy::Open`]: logged at `warn` and reported as `None`
/// - [`FailurePolicy::Closed`]: returned to the caller unchanged
///
/// A command the store rejects, or a stored value that is not a counter, is
/// always returned, whatever the policy.
///
/// The client's default policy can be overridden per call with the
/// `*_with_policy` methods.
#[derive(Clone)]
pub struct CounterClient {
    backend: Option<Arc<dyn CounterBackend>>,
    policy: FailurePolicy,
    timeout: Duration,
}

impl CounterClient {
    /// Creates a client over `backend`.
    pub fn new(backend: Arc<dyn CounterBackend>, policy: FailurePolicy, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            policy,
            timeout,
        }
    }

    /// Creates a client that never touches any store.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            policy: FailurePolicy::Open,
            timeout: Duration::ZERO,
        }
    }

    /// Creates a client from configuration.
    ///
    /// When `config.enabled` is false the client is [`CounterClient::disabled`].
    /// Otherwise a Redis backend is prepared; it connects on first use.
    pub fn from_config(config: &CounterStoreConfig) -> Result<Self> {
        if !config.enabled {
            debug!("Counter store disabled");
            return Ok(Self::disabled());
        }

        let backend = RedisBackend::open(&config.url())?;
        Ok(Self::new(Arc::new(backend), config.failure_policy, config.timeout()))
    }

    /// Returns true if a backend is configured.
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Default failure policy.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Timeout applied to every operation.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reads the raw value at `key`.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_with_policy(key, self.policy).await
    }

    /// Reads the raw value at `key` under an explicit failure policy.
    #[instrument(skip(self))]
    pub async fn get_with_policy(&self, key: &str, policy: FailurePolicy) -> Result<Option<Vec<u8>>> {
        let Some(backend) = &self.backend else {
            return Ok(None);
        };
        let value = self.call("get", key, policy, backend.get(key)).await?;
        Ok(value.flatten())
    }

    /// Writes `value` at `key`.
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set_with_policy(key, value, self.policy).await
    }

    /// Writes `value` at `key` under an explicit failure policy.
    #[instrument(skip(self, value))]
    pub async fn set_with_policy(&self, key: &str, value: &[u8], policy: FailurePolicy) -> Result<()> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        self.call("set", key, policy, backend.set(key, value)).await?;
        Ok(())
    }

    /// Atomically increments the integer at `key`, creating it at 1.
    ///
    /// Returns the new value, or `None` when the store is disabled or
    /// unavailable under fail-open.
    pub async fn incr(&self, key: &str) -> Result<Option<i64>> {
        self.incr_with_policy(key, self.policy).await
    }

    /// Increments the integer at `key` under an explicit failure policy.
    #[instrument(skip(self))]
    pub async fn incr_with_policy(&self, key: &str, policy: FailurePolicy) -> Result<Option<i64>> {
        let Some(backend) = &self.backend else {
            return Ok(None);
        };
        self.call("incr", key, policy, backend.incr(key)).await
    }

    /// Removes `key`.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        self.call("delete", key, self.policy, backend.delete(key)).await?;
        Ok(())
    }

    /// Counts one more notification sent today (UTC) by `service_id`.
    pub async fn increment_daily_count(&self, service_id: ServiceId) -> Result<Option<i64>> {
        self.incr(&CounterKey::daily_count(service_id).render()).await
    }

    /// Reads today's (UTC) send count for `service_id`.
    pub async fn get_daily_count(&self, service_id: ServiceId) -> Result<Option<i64>> {
        let key = CounterKey::daily_count(service_id).render();
        match self.get(&key).await? {
            None => Ok(None),
            Some(raw) => parse_count(&key, &raw).map(Some),
        }
    }

    /// Runs one backend operation under the timeout and failure policy.
    async fn call<T, F>(&self, op: &'static str, key: &str, policy: FailurePolicy, fut: F) -> Result<Option<T>>
    where
        F: Future<Output = Result<T>>,
    {
        let outcome = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(GuardError::StoreTimeout {
                millis: self.timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_recoverable() && policy == FailurePolicy::Open => {
                warn!(op, key, error = %err, "Counter store unavailable, continuing without it");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

fn parse_count(key: &str, raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| GuardError::InvalidCounterValue {
            key: key.to_string(),
            value: String::from_utf8_lossy(raw).into_owned(),
        })
}
