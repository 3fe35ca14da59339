//! Default policy constants for Tollgate.
//!
//! Cache TTLs reflect how quickly a change must reach every API process:
//! permission edits and service deactivation within a couple of seconds, key
//! revocation within ten.

// ═══════════════════════════════════════════════════════════════════════════════
// PER-CONCERN CACHE DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default TTL for cached API keys, in seconds.
pub const API_KEY_CACHE_TTL_SECS: u64 = 10;

/// Default TTL for cached permission sets, in seconds.
pub const PERMISSION_CACHE_TTL_SECS: u64 = 2;

/// Default TTL for cached service active flags, in seconds.
pub const SERVICE_ACTIVE_CACHE_TTL_SECS: u64 = 2;

/// Default maximum number of services held by each concern cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

// ═══════════════════════════════════════════════════════════════════════════════
// COUNTER STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Default counter store host.
pub const DEFAULT_COUNTER_HOST: &str = "localhost";

/// Default counter store (Redis) port.
pub const DEFAULT_COUNTER_PORT: u16 = 6379;

/// Default timeout applied to every counter store operation, in milliseconds.
pub const DEFAULT_COUNTER_TIMEOUT_MS: u64 = 500;

// ═══════════════════════════════════════════════════════════════════════════════
// METRICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default StatsD host.
pub const DEFAULT_STATSD_HOST: &str = "localhost";

/// Default StatsD port.
pub const DEFAULT_STATSD_PORT: u16 = 8125;

/// Default metric name prefix.
pub const DEFAULT_STATSD_PREFIX: &str = "notifications";

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Name of the write-primary bind.
pub const PRIMARY_BIND: &str = "primary";

/// Name of the read-replica bind.
pub const REPLICA_BIND: &str = "replica";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocation_propagates_slower_than_permission_edits() {
        assert!(API_KEY_CACHE_TTL_SECS >= PERMISSION_CACHE_TTL_SECS);
        assert_eq!(PERMISSION_CACHE_TTL_SECS, SERVICE_ACTIVE_CACHE_TTL_SECS);
    }

    #[test]
    fn test_bind_names_unique() {
        assert_ne!(PRIMARY_BIND, REPLICA_BIND);
    }
}
