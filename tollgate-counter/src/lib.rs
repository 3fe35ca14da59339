//! # Tollgate Counter
//!
//! Cross-process daily counters for rate limiting.
//!
//! [`CounterClient`] wraps a [`CounterBackend`] with the process-wide enabled
//! flag, one timeout for every operation, and a fail-open/fail-closed policy.
//! Two backends are provided:
//!
//! - **Redis**: the production store, shared by every API process
//! - **Memory**: process-local, for tests and single-node development
//!
//! ## Example
//!
//! ```rust,ignore
//! use tollgate_counter::CounterClient;
//! use tollgate_core::CounterStoreConfig;
//!
//! let counters = CounterClient::from_config(&CounterStoreConfig::new("localhost", 6379))?;
//!
//! // None when the store is disabled or unreachable under fail-open
//! let sent_today = counters.increment_daily_count(service_id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod client;
mod memory;
mod remote;

pub use client::CounterClient;
pub use memory::MemoryBackend;
pub use remote::RedisBackend;

// Re-export the trait from core
pub use tollgate_core::traits::CounterBackend;
