//! Redis counter backend.
//!
//! The connection is established on first use and then reused for the life of
//! the process. A failed connect leaves the slot empty so the next call tries
//! again.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use tollgate_core::error::{GuardError, Result};
use tollgate_core::traits::CounterBackend;

/// Counter backend on a Redis server.
pub struct RedisBackend {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisBackend {
    /// Creates a backend for `url` without connecting.
    ///
    /// A malformed URL is a configuration error.
    pub fn open(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| GuardError::ConfigError(format!("invalid redis url '{}': {}", url, e)))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    /// Returns true once a connection has been established.
    pub fn is_connected(&self) -> bool {
        self.connection.initialized()
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                debug!("Connecting to counter store");
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(store_error)
            })
            .await?;

        // ConnectionManager clones share one multiplexed connection
        Ok(conn.clone())
    }
}

/// Connection-level failures are transient; anything the server answered
/// with (wrong type, bad reply) is not.
fn store_error(err: RedisError) -> GuardError {
    if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() || err.is_connection_refusal() {
        GuardError::StoreUnavailable(err.to_string())
    } else {
        GuardError::StoreRejected(err.to_string())
    }
}

#[async_trait]
impl CounterBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<Vec<u8>>>(key).await.map_err(store_error)
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(key, value).await.map_err(store_error)
    }

    #[instrument(skip(self))]
    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.connection().await?;
        conn.incr::<_, _, i64>(key, 1).await.map_err(store_error)
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await.map_err(store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_does_not_connect() {
        let backend = RedisBackend::open("redis://127.0.0.1:6379").unwrap();
        assert!(!backend.is_connected());
        assert_eq!(backend.name(), "redis");
    }

    #[test]
    fn test_connection_failures_are_recoverable() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = store_error(RedisError::from(refused));
        assert!(matches!(err, GuardError::StoreUnavailable(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_wrong_type_is_not_recoverable() {
        let wrong_type = RedisError::from((
            redis::ErrorKind::TypeError,
            "WRONGTYPE Operation against a key holding the wrong kind of value",
        ));
        let err = store_error(wrong_type);
        assert!(matches!(err, GuardError::StoreRejected(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_malformed_url_is_config_error() {
        let err = RedisBackend::open("not a url").err().unwrap();
        assert!(err.is_config_error());
    }
}
