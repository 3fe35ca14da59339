//! In-memory authoritative store.
//!
//! Fast, thread-safe stand-in for the relational store, suitable for
//! development, tests, and load simulation. Each instance counts the queries
//! it serves so callers can see where routing sent them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

use tollgate_core::error::{GuardError, Result};
use tollgate_core::traits::AuthoritativeStore;
use tollgate_core::types::{ApiKeyRecord, PermissionRecord, ServiceId, ServiceSnapshot};

/// In-memory authoritative store.
#[derive(Debug)]
pub struct MemoryStore {
    label: String,
    services: DashMap<ServiceId, ServiceSnapshot>,
    queries: AtomicU64,
    available: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store labelled `label` (used in logs).
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            services: DashMap::new(),
            queries: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Store label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Inserts or replaces a service.
    pub fn upsert_service(&self, service_id: ServiceId, snapshot: ServiceSnapshot) {
        self.services.insert(service_id, snapshot);
    }

    /// Sets a service's active flag. Returns false if the service is unknown.
    pub fn set_active(&self, service_id: ServiceId, active: bool) -> bool {
        self.services
            .get_mut(&service_id)
            .map(|mut s| s.active = active)
            .is_some()
    }

    /// Replaces a service's permissions. Returns false if the service is unknown.
    pub fn set_permissions(&self, service_id: ServiceId, permissions: Vec<PermissionRecord>) -> bool {
        self.services
            .get_mut(&service_id)
            .map(|mut s| s.permissions = permissions)
            .is_some()
    }

    /// Revokes one key as of `at`. Returns false if no such key exists.
    pub fn revoke_key(&self, service_id: ServiceId, key_id: Uuid, at: DateTime<Utc>) -> bool {
        let Some(mut service) = self.services.get_mut(&service_id) else {
            return false;
        };
        match service.api_keys.iter_mut().find(|k| k.id == key_id) {
            Some(key) => {
                key.expiry_date = Some(at);
                true
            }
            None => false,
        }
    }

    /// Simulates an outage: while unavailable every query fails with
    /// [`GuardError::AuthoritativeLoad`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of queries served (or attempted) so far.
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<()> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GuardError::AuthoritativeLoad(format!(
                "store '{}' is unavailable",
                self.label
            )))
        }
    }
}

#[async_trait]
impl AuthoritativeStore for MemoryStore {
    #[instrument(skip(self), fields(store = %self.label))]
    async fn fetch_api_keys(&self, service_id: ServiceId) -> Result<Vec<ApiKeyRecord>> {
        self.begin()?;
        Ok(self
            .services
            .get(&service_id)
            .map(|s| s.api_keys.clone())
            .unwrap_or_default())
    }

    #[instrument(skip(self), fields(store = %self.label))]
    async fn fetch_permissions(&self, service_id: ServiceId) -> Result<Vec<PermissionRecord>> {
        self.begin()?;
        Ok(self
            .services
            .get(&service_id)
            .map(|s| s.permissions.clone())
            .unwrap_or_default())
    }

    #[instrument(skip(self), fields(store = %self.label))]
    async fn fetch_is_active(&self, service_id: ServiceId) -> Result<Option<bool>> {
        self.begin()?;
        Ok(self.services.get(&service_id).map(|s| s.active))
    }

    #[instrument(skip(self), fields(store = %self.label))]
    async fn fetch_service_snapshot(&self, service_id: ServiceId) -> Result<Option<ServiceSnapshot>> {
        self.begin()?;
        let snapshot = self.services.get(&service_id).map(|s| s.value().clone());
        debug!(found = snapshot.is_some(), "Loaded service snapshot");
        Ok(snapshot)
    }
}
