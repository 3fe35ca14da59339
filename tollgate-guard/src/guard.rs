//! Cached authentication lookups and daily rate limiting.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use tollgate_cache::{
    ApiKeyCache, CacheStats, Clock, ConcernCache, PermissionCache, ServiceActiveCache, SystemClock,
};
use tollgate_core::config::{CachesConfig, GuardConfig};
use tollgate_core::constants::REPLICA_BIND;
use tollgate_core::error::{GuardError, Result};
use tollgate_core::traits::AuthoritativeStore;
use tollgate_core::types::{ApiKeyRecord, PermissionRecord, ServiceId};
use tollgate_counter::CounterClient;
use tollgate_metrics::Metrics;
use tollgate_routing::Binds;

/// Named authoritative-store connections.
pub type StoreBinds = Binds<Arc<dyn AuthoritativeStore>>;

/// A service that passed [`Guard::authorize`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuthorizedService {
    /// The service
    pub service_id: ServiceId,
    /// Keys live at the moment of authorization
    pub api_keys: Vec<ApiKeyRecord>,
    /// Everything the service may do
    pub permissions: Vec<PermissionRecord>,
}

/// Request-time authentication and rate-limit guard.
///
/// One per process. Owns one cache per concern, the named store connections,
/// the counter client, and the metrics sink.
///
/// # Lookups
///
/// `get_api_keys`, `get_permissions` and `get_is_active` all follow the same
/// path: a cache hit returns at once; a miss takes that cache's load gate,
/// checks again, loads from the read replica, and populates the cache before
/// releasing the gate. Gates are per service: concurrent missers for one
/// service cost a single replica query, and a slow load never delays misses
/// for other services. A failed load caches nothing and is returned
/// unchanged; [`Guard::authorize`] turns it into a denial.
pub struct Guard {
    api_keys: ApiKeyCache,
    permissions: PermissionCache,
    service_active: ServiceActiveCache,
    binds: StoreBinds,
    counters: CounterClient,
    metrics: Metrics,
}

impl Guard {
    /// Creates a guard over explicit collaborators.
    ///
    /// Fails with [`GuardError::UnknownBind`] if `binds` has no replica.
    pub fn new(
        binds: StoreBinds,
        counters: CounterClient,
        metrics: Metrics,
        caches: &CachesConfig,
    ) -> Result<Self> {
        Self::with_clock(binds, counters, metrics, caches, Arc::new(SystemClock))
    }

    /// Creates a guard whose caches read time from `clock`.
    pub fn with_clock(
        binds: StoreBinds,
        counters: CounterClient,
        metrics: Metrics,
        caches: &CachesConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if !binds.contains(REPLICA_BIND) {
            return Err(GuardError::UnknownBind(REPLICA_BIND.to_string()));
        }

        Ok(Self {
            api_keys: ApiKeyCache::with_clock("api-keys", caches.api_keys, clock.clone()),
            permissions: PermissionCache::with_clock("permissions", caches.permissions, clock.clone()),
            service_active: ServiceActiveCache::with_clock("service-active", caches.service_active, clock),
            binds,
            counters,
            metrics,
        })
    }

    /// Builds the counter client and metrics sink from `config`.
    pub fn from_config(config: &GuardConfig, binds: StoreBinds) -> Result<Self> {
        let counters = CounterClient::from_config(&config.counter)?;
        let metrics = Metrics::from_config(&config.metrics);
        let guard = Self::new(binds, counters, metrics, &config.caches)?;

        info!(
            counters = guard.counters.is_enabled(),
            metrics = guard.metrics.is_enabled(),
            binds = ?guard.binds,
            "Guard ready"
        );
        Ok(guard)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CACHED LOOKUPS
    // ═══════════════════════════════════════════════════════════════════════

    /// Returns all API keys of `service_id`, revoked ones included.
    #[instrument(skip(self))]
    pub async fn get_api_keys(&self, service_id: ServiceId) -> Result<Vec<ApiKeyRecord>> {
        let keys = self
            .lookup(&self.api_keys, service_id, |store| async move {
                store.fetch_api_keys(service_id).await.map(Some)
            })
            .await?;
        Ok(keys.unwrap_or_default())
    }

    /// Returns the permissions granted to `service_id`.
    #[instrument(skip(self))]
    pub async fn get_permissions(&self, service_id: ServiceId) -> Result<Vec<PermissionRecord>> {
        let permissions = self
            .lookup(&self.permissions, service_id, |store| async move {
                store.fetch_permissions(service_id).await.map(Some)
            })
            .await?;
        Ok(permissions.unwrap_or_default())
    }

    /// Returns whether `service_id` is active, or `None` if it does not exist.
    ///
    /// Unknown services are not cached.
    #[instrument(skip(self))]
    pub async fn get_is_active(&self, service_id: ServiceId) -> Result<Option<bool>> {
        self.lookup(&self.service_active, service_id, |store| async move {
            store.fetch_is_active(service_id).await
        })
        .await
    }

    /// Loads all three facts for `service_id` in one replica round trip and
    /// populates every cache. Returns false for an unknown service.
    #[instrument(skip(self))]
    pub async fn prime(&self, service_id: ServiceId) -> Result<bool> {
        let snapshot = self
            .binds
            .with_read_replica(|store| async move { store.fetch_service_snapshot(service_id).await })
            .await?;

        let Some(snapshot) = snapshot else {
            return Ok(false);
        };
        self.api_keys.put(service_id, snapshot.api_keys);
        self.permissions.put(service_id, snapshot.permissions);
        self.service_active.put(service_id, snapshot.active);
        Ok(true)
    }

    /// Drops everything cached about `service_id`.
    pub fn invalidate(&self, service_id: ServiceId) {
        self.api_keys.invalidate(service_id);
        self.permissions.invalidate(service_id);
        self.service_active.invalidate(service_id);
    }

    /// Drops every cached entry.
    pub fn clear_caches(&self) {
        self.api_keys.clear();
        self.permissions.clear();
        self.service_active.clear();
    }

    /// Cache statistics keyed by concern name.
    pub fn cache_stats(&self) -> [(&'static str, CacheStats); 3] {
        [
            (self.api_keys.name(), self.api_keys.stats()),
            (self.permissions.name(), self.permissions.stats()),
            (self.service_active.name(), self.service_active.stats()),
        ]
    }

    /// Emits one size gauge per cache.
    pub fn report_cache_sizes(&self) {
        for (name, stats) in self.cache_stats() {
            self.metrics
                .gauge(&format!("auth-cache.{}.size", name), stats.len as u64);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // AUTHORIZATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Decides whether `service_id` may perform `required_permission` now.
    ///
    /// Fails closed: an unknown or inactive service, a service without a live
    /// key, a missing permission, or any failure to load those facts is
    /// [`GuardError::Unauthorized`]. Only configuration errors pass through
    /// unchanged.
    #[instrument(skip(self))]
    pub async fn authorize(
        &self,
        service_id: ServiceId,
        required_permission: &str,
    ) -> Result<AuthorizedService> {
        match self.evaluate(service_id, required_permission).await {
            Ok(service) => Ok(service),
            Err(err) if err.is_config_error() || err.is_auth_error() => Err(err),
            Err(err) => {
                warn!(%service_id, error = %err, "Could not load service, denying");
                self.metrics.incr("auth.load-failure", 1, 1.0);
                Err(GuardError::unauthorized(format!(
                    "could not verify service {}",
                    service_id
                )))
            }
        }
    }

    async fn evaluate(
        &self,
        service_id: ServiceId,
        required_permission: &str,
    ) -> Result<AuthorizedService> {
        match self.get_is_active(service_id).await? {
            None => {
                return Err(GuardError::unauthorized(format!(
                    "unknown service {}",
                    service_id
                )))
            }
            Some(false) => {
                return Err(GuardError::unauthorized(format!(
                    "service {} is inactive",
                    service_id
                )))
            }
            Some(true) => {}
        }

        let now = Utc::now();
        let api_keys: Vec<ApiKeyRecord> = self
            .get_api_keys(service_id)
            .await?
            .into_iter()
            .filter(|key| key.is_live_at(now))
            .collect();
        if api_keys.is_empty() {
            return Err(GuardError::unauthorized(format!(
                "service {} has no live API keys",
                service_id
            )));
        }

        let permissions = self.get_permissions(service_id).await?;
        if !permissions.iter().any(|p| p.grants(required_permission)) {
            return Err(GuardError::unauthorized(format!(
                "service {} lacks permission '{}'",
                service_id, required_permission
            )));
        }

        Ok(AuthorizedService {
            service_id,
            api_keys,
            permissions,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RATE LIMITING
    // ═══════════════════════════════════════════════════════════════════════

    /// Counts one send for `service_id` today (UTC).
    ///
    /// `None` when the counter store is disabled or unreachable under
    /// fail-open.
    pub async fn increment_daily_count(&self, service_id: ServiceId) -> Result<Option<i64>> {
        self.counters.increment_daily_count(service_id).await
    }

    /// Counts one send and rejects it if today's total now exceeds `limit`.
    ///
    /// Returns the new total, or 0 when no count was available.
    #[instrument(skip(self))]
    pub async fn check_daily_limit(&self, service_id: ServiceId, limit: i64) -> Result<i64> {
        let Some(sent) = self.increment_daily_count(service_id).await? else {
            debug!(%service_id, "No daily count available, allowing");
            return Ok(0);
        };

        if sent > limit {
            warn!(%service_id, sent, limit, "Daily limit exceeded");
            self.metrics.incr("rate-limit.exceeded", 1, 1.0);
            return Err(GuardError::RateLimitExceeded { service_id, limit });
        }
        Ok(sent)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ROUTING
    // ═══════════════════════════════════════════════════════════════════════

    /// Runs `query` against the read replica.
    pub async fn with_read_replica<F, Fut, T>(&self, query: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn AuthoritativeStore>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.binds.with_read_replica(query).await
    }

    /// Named store connections.
    pub fn binds(&self) -> &StoreBinds {
        &self.binds
    }

    /// Counter store client.
    pub fn counters(&self) -> &CounterClient {
        &self.counters
    }

    /// Metrics sink.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// get → gate → get → replica load → put, with hit/miss/load metrics.
    ///
    /// A load yielding `None` is returned but not cached.
    async fn lookup<V, F, Fut>(
        &self,
        cache: &ConcernCache<V>,
        service_id: ServiceId,
        load: F,
    ) -> Result<Option<V>>
    where
        V: Clone,
        F: FnOnce(Arc<dyn AuthoritativeStore>) -> Fut,
        Fut: Future<Output = Result<Option<V>>>,
    {
        if let Some(value) = cache.get(service_id) {
            self.metrics.incr(&format!("auth-cache.{}.hit", cache.name()), 1, 1.0);
            return Ok(Some(value));
        }
        self.metrics.incr(&format!("auth-cache.{}.miss", cache.name()), 1, 1.0);

        let _gate = cache.load_gate(service_id).await;
        if let Some(value) = cache.get(service_id) {
            return Ok(Some(value));
        }

        let start = Instant::now();
        let loaded = self.binds.with_read_replica(load).await?;
        self.metrics.timing(
            &format!("auth-cache.{}.load", cache.name()),
            start.elapsed().as_secs_f64(),
            1.0,
        );

        if let Some(value) = &loaded {
            debug!(cache = cache.name(), %service_id, "Populated cache");
            cache.put(service_id, value.clone());
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::time::Duration;

    use tokio::task::JoinSet;
    use uuid::Uuid;

    use tollgate_cache::ManualClock;
    use tollgate_core::config::{FailurePolicy, MetricsConfig};
    use tollgate_core::types::ServiceSnapshot;
    use tollgate_counter::MemoryBackend;
    use tollgate_routing::MemoryStore;

    struct Fixture {
        primary: Arc<MemoryStore>,
        replica: Arc<MemoryStore>,
        backend: Arc<MemoryBackend>,
        clock: Arc<ManualClock>,
        guard: Guard,
    }

    fn fixture_with(policy: FailurePolicy, metrics: Metrics) -> Fixture {
        let primary = Arc::new(MemoryStore::new("primary"));
        let replica = Arc::new(MemoryStore::new("replica"));
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::new());

        let binds = StoreBinds::new(primary.clone() as Arc<dyn AuthoritativeStore>)
            .with_replica(replica.clone());
        let counters = CounterClient::new(backend.clone(), policy, Duration::from_millis(200));
        let guard = Guard::with_clock(
            binds,
            counters,
            metrics,
            &CachesConfig::default(),
            clock.clone(),
        )
        .unwrap();

        Fixture {
            primary,
            replica,
            backend,
            clock,
            guard,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(FailurePolicy::Open, Metrics::disabled())
    }

    fn service(fx: &Fixture, permissions: &[&str]) -> ServiceId {
        let service_id = Uuid::new_v4();
        fx.replica.upsert_service(
            service_id,
            ServiceSnapshot {
                api_keys: vec![ApiKeyRecord::new(Uuid::new_v4(), "secret/live")],
                permissions: permissions.iter().map(|p| PermissionRecord::new(*p)).collect(),
                active: true,
            },
        );
        service_id
    }

    #[test]
    fn test_requires_replica_bind() {
        let binds = StoreBinds::new(Arc::new(MemoryStore::new("primary")));
        let result = Guard::new(
            binds,
            CounterClient::disabled(),
            Metrics::disabled(),
            &CachesConfig::default(),
        );
        assert!(matches!(result, Err(GuardError::UnknownBind(ref name)) if name == "replica"));
    }

    #[test]
    fn test_from_default_config() {
        let binds = StoreBinds::new(Arc::new(MemoryStore::new("primary")))
            .with_replica(Arc::new(MemoryStore::new("replica")));
        let guard = Guard::from_config(&GuardConfig::default(), binds).unwrap();
        assert!(!guard.counters().is_enabled());
        assert!(!guard.metrics().is_enabled());
    }

    #[tokio::test]
    async fn test_lookups_hit_replica_once() {
        let fx = fixture();
        let service_id = service(&fx, &[PermissionRecord::EMAIL, PermissionRecord::SMS]);

        for _ in 0..3 {
            assert_eq!(fx.guard.get_api_keys(service_id).await.unwrap().len(), 1);
            assert_eq!(fx.guard.get_permissions(service_id).await.unwrap().len(), 2);
            assert_eq!(fx.guard.get_is_active(service_id).await.unwrap(), Some(true));
        }

        assert_eq!(fx.replica.queries(), 3);
        assert_eq!(fx.primary.queries(), 0);

        let [(name, stats), ..] = fx.guard.cache_stats();
        assert_eq!(name, "api-keys");
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.len, 1);
    }

    #[tokio::test]
    async fn test_permission_change_visible_after_ttl() {
        let fx = fixture();
        let service_id = service(&fx, &[PermissionRecord::SMS]);

        assert!(fx.guard.authorize(service_id, PermissionRecord::SMS).await.is_ok());
        fx.replica.set_permissions(service_id, vec![PermissionRecord::new(PermissionRecord::EMAIL)]);

        // Still cached
        fx.clock.advance(Duration::from_secs(1));
        assert!(fx.guard.authorize(service_id, PermissionRecord::SMS).await.is_ok());

        fx.clock.advance(Duration::from_secs(2));
        let err = fx.guard.authorize(service_id, PermissionRecord::SMS).await.unwrap_err();
        assert!(matches!(err, GuardError::Unauthorized { .. }));
        assert!(fx.guard.authorize(service_id, PermissionRecord::EMAIL).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_service_is_not_cached() {
        let fx = fixture();
        let service_id = Uuid::new_v4();

        assert_eq!(fx.guard.get_is_active(service_id).await.unwrap(), None);
        assert_eq!(fx.guard.get_is_active(service_id).await.unwrap(), None);
        assert_eq!(fx.replica.queries(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_load_once() {
        let fx = fixture();
        let service_id = service(&fx, &[PermissionRecord::SMS]);
        let replica = fx.replica.clone();
        let guard = Arc::new(fx.guard);
        let mut tasks = JoinSet::new();

        for _ in 0..32 {
            let guard = guard.clone();
            tasks.spawn(async move { guard.get_permissions(service_id).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap().unwrap().len(), 1);
        }

        assert_eq!(replica.queries(), 1);
    }

    /// Replica whose permission query for one service is slow.
    struct SlowPermissions {
        slow: ServiceId,
        inner: MemoryStore,
    }

    #[async_trait::async_trait]
    impl AuthoritativeStore for SlowPermissions {
        async fn fetch_api_keys(&self, service_id: ServiceId) -> Result<Vec<ApiKeyRecord>> {
            self.inner.fetch_api_keys(service_id).await
        }

        async fn fetch_permissions(&self, service_id: ServiceId) -> Result<Vec<PermissionRecord>> {
            if service_id == self.slow {
                tokio::time::sleep(Duration::from_millis(800)).await;
            }
            self.inner.fetch_permissions(service_id).await
        }

        async fn fetch_is_active(&self, service_id: ServiceId) -> Result<Option<bool>> {
            self.inner.fetch_is_active(service_id).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_load_does_not_block_other_services() {
        let (slow, other) = (Uuid::new_v4(), Uuid::new_v4());
        let replica = SlowPermissions {
            slow,
            inner: MemoryStore::new("replica"),
        };
        for service_id in [slow, other] {
            replica.inner.upsert_service(
                service_id,
                ServiceSnapshot {
                    permissions: vec![PermissionRecord::new(PermissionRecord::SMS)],
                    active: true,
                    ..ServiceSnapshot::default()
                },
            );
        }

        let binds = StoreBinds::new(Arc::new(MemoryStore::new("primary")))
            .with_replica(Arc::new(replica));
        let guard = Arc::new(
            Guard::new(binds, CounterClient::disabled(), Metrics::disabled(), &CachesConfig::default())
                .unwrap(),
        );

        let slow_lookup = tokio::spawn({
            let guard = guard.clone();
            async move { guard.get_permissions(slow).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let permissions = tokio::time::timeout(Duration::from_millis(300), guard.get_permissions(other))
            .await
            .expect("unrelated miss waited on the slow load")
            .unwrap();
        assert_eq!(permissions.len(), 1);
        assert!(started.elapsed() < Duration::from_millis(300));

        assert_eq!(slow_lookup.await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_authorize_grants() {
        let fx = fixture();
        let service_id = service(&fx, &[PermissionRecord::EMAIL, PermissionRecord::SMS]);

        let authorized = fx.guard.authorize(service_id, PermissionRecord::EMAIL).await.unwrap();
        assert_eq!(authorized.service_id, service_id);
        assert_eq!(authorized.api_keys.len(), 1);
        assert_eq!(authorized.permissions.len(), 2);
    }

    #[tokio::test]
    async fn test_authorize_denials() {
        let fx = fixture();

        let unknown = Uuid::new_v4();
        let inactive = service(&fx, &[PermissionRecord::SMS]);
        fx.replica.set_active(inactive, false);
        let revoked = Uuid::new_v4();
        let key_id = Uuid::new_v4();
        fx.replica.upsert_service(
            revoked,
            ServiceSnapshot {
                api_keys: vec![ApiKeyRecord::new(key_id, "secret/old")],
                permissions: vec![PermissionRecord::new(PermissionRecord::SMS)],
                active: true,
            },
        );
        fx.replica.revoke_key(revoked, key_id, Utc::now() - chrono::Duration::hours(1));
        let limited = service(&fx, &[PermissionRecord::EMAIL]);

        for service_id in [unknown, inactive, revoked, limited] {
            let err = fx.guard.authorize(service_id, PermissionRecord::SMS).await.unwrap_err();
            assert!(matches!(err, GuardError::Unauthorized { .. }), "{service_id}: {err}");
        }
    }

    #[tokio::test]
    async fn test_authorize_fails_closed_on_load_failure() {
        let fx = fixture();
        let service_id = service(&fx, &[PermissionRecord::SMS]);
        fx.replica.set_available(false);

        let err = fx.guard.get_is_active(service_id).await.unwrap_err();
        assert!(matches!(err, GuardError::AuthoritativeLoad(_)));

        let err = fx.guard.authorize(service_id, PermissionRecord::SMS).await.unwrap_err();
        assert!(matches!(err, GuardError::Unauthorized { .. }));

        // Nothing was cached by the failures
        fx.replica.set_available(true);
        assert!(fx.guard.authorize(service_id, PermissionRecord::SMS).await.is_ok());
    }

    #[tokio::test]
    async fn test_prime_fills_all_caches() {
        let fx = fixture();
        let service_id = service(&fx, &[PermissionRecord::LETTER]);

        assert!(fx.guard.prime(service_id).await.unwrap());
        assert!(!fx.guard.prime(Uuid::new_v4()).await.unwrap());
        let after_prime = fx.replica.queries();

        assert!(fx.guard.authorize(service_id, PermissionRecord::LETTER).await.is_ok());
        assert_eq!(fx.replica.queries(), after_prime);

        fx.guard.invalidate(service_id);
        assert!(fx.guard.authorize(service_id, PermissionRecord::LETTER).await.is_ok());
        assert_eq!(fx.replica.queries(), after_prime + 3);
    }

    #[tokio::test]
    async fn test_daily_limit() {
        let fx = fixture();
        let service_id = Uuid::new_v4();

        assert_eq!(fx.guard.check_daily_limit(service_id, 2).await.unwrap(), 1);
        assert_eq!(fx.guard.check_daily_limit(service_id, 2).await.unwrap(), 2);
        let err = fx.guard.check_daily_limit(service_id, 2).await.unwrap_err();
        assert!(matches!(err, GuardError::RateLimitExceeded { limit: 2, .. }));
        assert_eq!(fx.guard.counters().get_daily_count(service_id).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_daily_limit_without_counter_store() {
        let binds = StoreBinds::new(Arc::new(MemoryStore::new("primary")))
            .with_replica(Arc::new(MemoryStore::new("replica")));
        let guard = Guard::new(
            binds,
            CounterClient::disabled(),
            Metrics::disabled(),
            &CachesConfig::default(),
        )
        .unwrap();

        let service_id = Uuid::new_v4();
        for _ in 0..5 {
            assert_eq!(guard.check_daily_limit(service_id, 1).await.unwrap(), 0);
        }
        assert_eq!(guard.increment_daily_count(service_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_daily_limit_counter_outage() {
        let open = fixture();
        open.backend.set_available(false);
        assert_eq!(open.guard.check_daily_limit(Uuid::new_v4(), 1).await.unwrap(), 0);

        let closed = fixture_with(FailurePolicy::Closed, Metrics::disabled());
        closed.backend.set_available(false);
        let err = closed.guard.check_daily_limit(Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, GuardError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_with_read_replica() {
        let fx = fixture();
        let service_id = service(&fx, &[]);

        let active = fx
            .guard
            .with_read_replica(|store| async move { store.fetch_is_active(service_id).await })
            .await
            .unwrap();
        assert_eq!(active, Some(true));
        assert_eq!(fx.replica.queries(), 1);
        assert_eq!(fx.primary.queries(), 0);
    }

    #[tokio::test]
    async fn test_lookup_metrics() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let port = socket.local_addr().unwrap().port();
        let metrics = Metrics::from_config(&MetricsConfig::new("127.0.0.1", port, "notifications"));

        let fx = fixture_with(FailurePolicy::Open, metrics);
        let service_id = service(&fx, &[PermissionRecord::SMS]);
        fx.guard.get_permissions(service_id).await.unwrap();
        fx.guard.get_permissions(service_id).await.unwrap();

        let mut buf = [0u8; 256];
        let mut lines = Vec::new();
        for _ in 0..3 {
            let n = socket.recv(&mut buf).unwrap();
            lines.push(String::from_utf8(buf[..n].to_vec()).unwrap());
        }

        assert_eq!(lines[0], "notifications.auth-cache.permissions.miss:1|c");
        assert!(lines[1].starts_with("notifications.auth-cache.permissions.load:"));
        assert!(lines[1].ends_with("|ms"));
        assert_eq!(lines[2], "notifications.auth-cache.permissions.hit:1|c");
    }
}
