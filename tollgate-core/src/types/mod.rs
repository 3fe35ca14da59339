//! Domain types for Tollgate.
//!
//! - [`ApiKeyRecord`]: A service's API key as loaded from the authoritative store
//! - [`PermissionRecord`]: One named permission granted to a service
//! - [`ServiceSnapshot`]: Keys, permissions, and active flag fetched in one round trip
//! - [`CounterKey`]: Deterministic key for a per-service daily counter

mod counter_key;
mod records;

pub use counter_key::*;
pub use records::*;
