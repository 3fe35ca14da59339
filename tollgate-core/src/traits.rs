//! Common traits for Tollgate.
//!
//! These are the seams to the two external collaborators that can block on the
//! network: the relational authoritative store and the distributed counter store.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ApiKeyRecord, PermissionRecord, ServiceId, ServiceSnapshot};

// ═══════════════════════════════════════════════════════════════════════════════
// AUTHORITATIVE STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Read access to the authoritative per-service facts.
///
/// Queried only on a cache miss. Implementations might use:
/// - PostgreSQL primary or replica connections (production)
/// - In-memory maps (testing/development)
#[async_trait]
pub trait AuthoritativeStore: Send + Sync {
    /// Returns the service's API keys, including revoked ones.
    ///
    /// Unknown services yield an empty list.
    async fn fetch_api_keys(&self, service_id: ServiceId) -> Result<Vec<ApiKeyRecord>>;

    /// Returns the service's granted permissions.
    async fn fetch_permissions(&self, service_id: ServiceId) -> Result<Vec<PermissionRecord>>;

    /// Returns the service's active flag, or `None` for an unknown service.
    async fn fetch_is_active(&self, service_id: ServiceId) -> Result<Option<bool>>;

    /// Fetches keys, permissions, and active flag together.
    ///
    /// The default issues three queries; stores that can join them should
    /// override this with a single round trip.
    async fn fetch_service_snapshot(&self, service_id: ServiceId) -> Result<Option<ServiceSnapshot>> {
        let Some(active) = self.fetch_is_active(service_id).await? else {
            return Ok(None);
        };
        Ok(Some(ServiceSnapshot {
            api_keys: self.fetch_api_keys(service_id).await?,
            permissions: self.fetch_permissions(service_id).await?,
            active,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COUNTER BACKEND TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// A key-value store with atomic integer increment.
///
/// Backends report every failure as an error; the enabled flag, timeout, and
/// fail-open/fail-closed policy are applied by the client wrapping them.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Reads the raw value at `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes `value` at `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Atomically increments the integer at `key`, creating it at 1 if absent.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Removes `key`.
    async fn delete(&self, key: &str) -> Result<()>;
}
