//! TTL caches for Tollgate.
//!
//! - [`TtlCache`]: generic expiring, capacity-bounded LRU map behind one reentrant lock
//! - [`ApiKeyCache`], [`PermissionCache`], [`ServiceActiveCache`]: one `TtlCache`
//!   each, sized and timed for how quickly their fact must propagate
//!
//! Caches never load anything themselves. Callers `get`, and only on a miss
//! take the service's load gate, query the authoritative store, and `put`.
//!
//! Synchronous callers that can load without awaiting use
//! [`TtlCache::get_or_insert_with`] instead, which holds the cache lock across
//! the whole miss → load → put sequence.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod clock;
mod concerns;
mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use concerns::{ApiKeyCache, ConcernCache, LoadGate, PermissionCache, ServiceActiveCache};
pub use ttl::{CacheStats, TtlCache};
