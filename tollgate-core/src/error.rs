//! Error types for Tollgate.
//!
//! A miss is never an error: unknown or expired cache keys, and a disabled or
//! unreachable counter store under the fail-open policy, surface as `None`.
//! Everything here is either fatal configuration, a transient store failure,
//! or an authorization outcome the middleware maps to a response.

use thiserror::Error;

use crate::types::ServiceId;

/// Result type alias using `GuardError`.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Main error type for all Tollgate operations.
#[derive(Debug, Error)]
pub enum GuardError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION ERRORS (fatal, never retried)
    // ═══════════════════════════════════════════════════════════════════════════

    /// A routing session asked for a bind with no configured connection.
    #[error("No connection configured for bind '{0}'")]
    UnknownBind(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSIENT STORE ERRORS (recoverable)
    // ═══════════════════════════════════════════════════════════════════════════

    /// The distributed counter store could not be reached.
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(String),

    /// A counter store operation exceeded the configured timeout.
    #[error("Counter store timed out after {millis}ms")]
    StoreTimeout {
        /// Timeout that elapsed
        millis: u64,
    },

    /// The authoritative store failed while loading on a cache miss.
    #[error("Authoritative load failed: {0}")]
    AuthoritativeLoad(String),

    /// The counter store answered but refused the command, e.g. a key
    /// holding the wrong type. Never swallowed by the fail-open policy.
    #[error("Counter store rejected command: {0}")]
    StoreRejected(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // AUTHORIZATION OUTCOMES
    // ═══════════════════════════════════════════════════════════════════════════

    /// The request is not authorized.
    #[error("Unauthorized: {reason}")]
    Unauthorized {
        /// Why the request was rejected
        reason: String,
    },

    /// The service has sent more than its daily limit.
    #[error("Exceeded send limits ({limit}) for today for service {service_id}")]
    RateLimitExceeded {
        /// Service over its limit
        service_id: ServiceId,
        /// Configured daily limit
        limit: i64,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A stored counter value was not an integer.
    #[error("Invalid counter value for '{key}': {value}")]
    InvalidCounterValue {
        /// Counter key
        key: String,
        /// Raw stored value
        value: String,
    },
}

impl GuardError {
    /// Creates an `Unauthorized` error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        GuardError::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Returns true if this error is recoverable (can retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GuardError::StoreUnavailable(_)
                | GuardError::StoreTimeout { .. }
                | GuardError::AuthoritativeLoad(_)
        )
    }

    /// Returns true if this is a fatal configuration error.
    pub fn is_config_error(&self) -> bool {
        matches!(self, GuardError::UnknownBind(_) | GuardError::ConfigError(_))
    }

    /// Returns true if the caller should answer with an authorization failure.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            GuardError::Unauthorized { .. } | GuardError::RateLimitExceeded { .. }
        )
    }
}
