//! In-memory TTL cache with LRU eviction.

use std::cell::RefCell;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::ReentrantMutex;
use tracing::trace;

use crate::clock::{Clock, SystemClock};

/// Cache entry with expiry.
#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<K: Hash + Eq + Clone, V> Inner<K, V> {
    fn lookup(&mut self, key: &K, now: Instant) -> Option<&CacheEntry<V>> {
        let expired = match self.entries.peek(key) {
            None => {
                self.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            self.entries.pop(key);
            self.expirations += 1;
            self.misses += 1;
            return None;
        }

        self.hits += 1;
        self.entries.get(key)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            self.entries.pop(key);
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }
}

/// Expiring key→value store bounded by capacity.
///
/// - `get` never returns an entry whose expiry has passed; expired entries are
///   dropped lazily when touched.
/// - At capacity, `put` of a new key first drops expired entries, then evicts
///   the least-recently-used one.
/// - One reentrant lock guards each instance, so code running inside
///   [`TtlCache::get_or_insert_with`] may call back into the same cache.
///
/// Misses are not failures: no operation on this type returns an error.
pub struct TtlCache<K: Hash + Eq, V> {
    inner: ReentrantMutex<RefCell<Inner<K, V>>>,
    ttl: Duration,
    capacity: NonZeroUsize,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a cache on the system clock.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self::with_clock(ttl, capacity, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    pub fn with_clock(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: ReentrantMutex::new(RefCell::new(Inner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            })),
            ttl,
            capacity,
            clock,
        }
    }

    /// Returns the live value for `key`, refreshing its recency.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.lookup(key, now).map(|e| e.value.clone())
    }

    /// Returns true if `key` holds a live value, without touching recency or stats.
    pub fn contains(&self, key: &K) -> bool {
        let now = self.clock.now();
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner
            .entries
            .peek(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Stores `value` under `key` for one TTL, replacing any previous value.
    pub fn put(&self, key: K, value: V) {
        let now = self.clock.now();
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();

        let is_new = !inner.entries.contains(&key);
        if is_new && inner.entries.len() >= self.capacity.get() {
            inner.purge_expired(now);
        }

        let entry = CacheEntry {
            value,
            inserted_at: now,
            expires_at: now.checked_add(self.ttl),
        };
        if let Some((evicted, _)) = inner.entries.push(key.clone(), entry) {
            if evicted != key {
                inner.evictions += 1;
                trace!("Evicted least-recently-used entry");
            }
        }
    }

    /// Returns the live value for `key`, or runs `loader` and stores its result.
    ///
    /// The cache lock is held from the lookup until the loaded value is stored,
    /// so concurrent callers missing on the same key run `loader` once between
    /// them. `loader` may re-enter this cache. A `None` from `loader` caches
    /// nothing.
    pub fn get_or_insert_with<F>(&self, key: K, loader: F) -> Option<V>
    where
        F: FnOnce() -> Option<V>,
    {
        let _guard = self.inner.lock();

        if let Some(value) = self.get(&key) {
            return Some(value);
        }

        let value = loader()?;
        self.put(key, value.clone());
        Some(value)
    }

    /// Removes `key`, returning its value if it was live.
    pub fn remove(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner
            .entries
            .pop(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.inner.lock().borrow_mut().entries.clear();
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.purge_expired(now)
    }

    /// Number of stored entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.inner.lock().borrow().entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Age of the entry under `key`, if one is stored (expired or not).
    pub fn age(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now();
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner
            .entries
            .peek(key)
            .map(|e| now.saturating_duration_since(e.inserted_at))
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            len: inner.entries.len(),
            capacity: self.capacity.get(),
        }
    }
}

/// Cache statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a live value
    pub hits: u64,
    /// Lookups that found nothing or an expired value
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Entries dropped because their TTL had passed
    pub expirations: u64,
    /// Entries currently stored
    pub len: usize,
    /// Maximum capacity
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0 when nothing was looked up.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
