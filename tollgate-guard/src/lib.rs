//! # Tollgate Guard
//!
//! The request-time authentication and rate-limit layer.
//!
//! [`Guard`] answers the three questions every inbound send request asks
//! (which API keys does this service have, what may it send, is it active)
//! from short-lived per-process caches, loading from the read replica only on
//! a miss. Daily send volume is counted in the distributed counter store.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tollgate_core::{GuardConfig, PermissionRecord};
//! use tollgate_guard::{Guard, StoreBinds};
//!
//! let binds = StoreBinds::new(primary).with_replica(replica);
//! let guard = Guard::from_config(&GuardConfig::from_env()?, binds)?;
//!
//! let service = guard.authorize(service_id, PermissionRecord::SMS).await?;
//! let sent_today = guard.check_daily_limit(service_id, 250_000).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod guard;

pub use guard::{AuthorizedService, Guard, StoreBinds};
