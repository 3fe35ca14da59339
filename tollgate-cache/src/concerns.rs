//! Per-concern caches for the authentication path.
//!
//! Each concern owns one [`TtlCache`] and one load gate per service being
//! loaded. Nothing is shared across concerns, and a slow load for one service
//! never holds up misses for another.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use tollgate_core::config::CacheSettings;
use tollgate_core::types::{ApiKeyRecord, PermissionRecord, ServiceId};

use crate::clock::Clock;
use crate::ttl::{CacheStats, TtlCache};

/// A per-service TTL cache for one authentication concern.
///
/// `get`/`put` never fail and never reach the authoritative store. On a miss
/// the caller takes [`ConcernCache::load_gate`] for that service, checks `get`
/// again, loads, and calls `put` before releasing the gate.
pub struct ConcernCache<V> {
    name: &'static str,
    entries: TtlCache<ServiceId, V>,
    load_gates: DashMap<ServiceId, Arc<Mutex<()>>>,
}

/// Exclusive right to load one service into one concern cache.
///
/// The gate entry is dropped with the last holder or waiter.
pub struct LoadGate<'a> {
    gates: &'a DashMap<ServiceId, Arc<Mutex<()>>>,
    service_id: ServiceId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LoadGate<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.gates
            .remove_if(&self.service_id, |_, gate| Arc::strong_count(gate) == 1);
    }
}

/// Cached API keys per service. Key revocation propagates within the TTL.
pub type ApiKeyCache = ConcernCache<Vec<ApiKeyRecord>>;

/// Cached permission sets per service.
pub type PermissionCache = ConcernCache<Vec<PermissionRecord>>;

/// Cached active flags per service.
pub type ServiceActiveCache = ConcernCache<bool>;

impl<V: Clone> ConcernCache<V> {
    /// Creates a named concern cache with explicit settings.
    pub fn with_settings(name: &'static str, settings: CacheSettings) -> Self {
        Self {
            name,
            entries: TtlCache::new(settings.ttl(), settings.capacity),
            load_gates: DashMap::new(),
        }
    }

    /// Creates a named concern cache reading time from `clock`.
    pub fn with_clock(name: &'static str, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            entries: TtlCache::with_clock(settings.ttl(), settings.capacity, clock),
            load_gates: DashMap::new(),
        }
    }

    /// Concern name, used as the metric segment.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the cached value for `service_id`, if still live.
    pub fn get(&self, service_id: ServiceId) -> Option<V> {
        self.entries.get(&service_id)
    }

    /// Replaces the cached value for `service_id`.
    pub fn put(&self, service_id: ServiceId, value: V) {
        self.entries.put(service_id, value);
    }

    /// Drops the cached value for `service_id`.
    pub fn invalidate(&self, service_id: ServiceId) {
        self.entries.remove(&service_id);
    }

    /// Drops every cached value.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Serializes miss → load → put for `service_id`.
    ///
    /// Callers loading different services never wait on each other.
    pub async fn load_gate(&self, service_id: ServiceId) -> LoadGate<'_> {
        let gate = self.load_gates.entry(service_id).or_default().clone();
        let guard = gate.lock_owned().await;
        LoadGate {
            gates: &self.load_gates,
            service_id,
            guard: Some(guard),
        }
    }

    /// Number of services with a load in progress or waiting.
    pub fn loads_in_flight(&self) -> usize {
        self.load_gates.len()
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.entries.ttl()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}

impl ApiKeyCache {
    /// Creates the API key cache with default settings.
    pub fn new() -> Self {
        Self::with_settings("api-keys", CacheSettings::api_keys())
    }
}

impl Default for ApiKeyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionCache {
    /// Creates the permission cache with default settings.
    pub fn new() -> Self {
        Self::with_settings("permissions", CacheSettings::permissions())
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceActiveCache {
    /// Creates the service active flag cache with default settings.
    pub fn new() -> Self {
        Self::with_settings("service-active", CacheSettings::service_active())
    }
}

impl Default for ServiceActiveCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::task::JoinSet;
    use uuid::Uuid;

    use crate::clock::ManualClock;

    #[test]
    fn test_default_ttls() {
        assert_eq!(ApiKeyCache::new().ttl(), Duration::from_secs(10));
        assert_eq!(PermissionCache::new().ttl(), Duration::from_secs(2));
        assert_eq!(ServiceActiveCache::new().ttl(), Duration::from_secs(2));
        assert_eq!(ApiKeyCache::new().stats().capacity, 1024);
    }

    #[test]
    fn test_miss_then_put() {
        let cache = ApiKeyCache::new();
        let service_id = Uuid::new_v4();
        assert!(cache.get(service_id).is_none());

        let keys = vec![ApiKeyRecord::new(Uuid::new_v4(), "secret/a")];
        cache.put(service_id, keys.clone());
        assert_eq!(cache.get(service_id), Some(keys));
    }

    #[test]
    fn test_empty_list_is_a_hit() {
        let cache = PermissionCache::new();
        let service_id = Uuid::new_v4();
        cache.put(service_id, Vec::new());
        assert_eq!(cache.get(service_id), Some(Vec::new()));
    }

    #[test]
    fn test_invalidate() {
        let cache = ServiceActiveCache::new();
        let service_id = Uuid::new_v4();
        cache.put(service_id, true);
        cache.invalidate(service_id);
        assert!(cache.get(service_id).is_none());
    }

    #[test]
    fn test_permission_scenario() {
        let clock = Arc::new(ManualClock::new());
        let cache = PermissionCache::with_clock("permissions", CacheSettings::new(2, 2), clock.clone());
        let [a, b, c, d] = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let perms: Vec<PermissionRecord> = vec!["email".into(), "sms".into()];

        cache.put(a, perms.clone());
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(a), Some(perms.clone()));
        clock.advance(Duration::from_secs(2));
        assert!(cache.get(a).is_none());

        cache.put(b, perms.clone());
        cache.put(c, perms.clone());
        // Touch b so c is least recently used
        assert!(cache.get(b).is_some());
        cache.put(d, perms.clone());

        assert!(cache.get(c).is_none());
        assert!(cache.get(b).is_some());
        assert!(cache.get(d).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_load_gate_allows_one_load_per_miss() {
        let cache = Arc::new(ServiceActiveCache::new());
        let loads = Arc::new(AtomicUsize::new(0));
        let service_id = Uuid::new_v4();
        let mut tasks = JoinSet::new();

        for _ in 0..32 {
            let cache = cache.clone();
            let loads = loads.clone();
            tasks.spawn(async move {
                if let Some(active) = cache.get(service_id) {
                    return active;
                }
                let _gate = cache.load_gate(service_id).await;
                if let Some(active) = cache.get(service_id) {
                    return active;
                }
                loads.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                cache.put(service_id, true);
                true
            });
        }

        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.loads_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_load_gates_are_per_service() {
        let cache = PermissionCache::new();
        let (slow, other) = (Uuid::new_v4(), Uuid::new_v4());

        let held = cache.load_gate(slow).await;
        let acquired = tokio::time::timeout(Duration::from_millis(200), cache.load_gate(other)).await;
        assert!(acquired.is_ok(), "gate for another service must not wait");
        drop(acquired);

        // Same service does wait
        let blocked = tokio::time::timeout(Duration::from_millis(50), cache.load_gate(slow)).await;
        assert!(blocked.is_err());

        drop(held);
        assert_eq!(cache.loads_in_flight(), 0);
        let _again = cache.load_gate(slow).await;
        assert_eq!(cache.loads_in_flight(), 1);
    }
}
