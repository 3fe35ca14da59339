//! # Tollgate Routing
//!
//! Directs individual authoritative-store queries to a named connection.
//!
//! - [`Binds`]: the process-wide set of named connections (`primary`, `replica`, ...)
//! - [`RoutingSession`]: request-scoped; `using_bind` redirects exactly one
//!   subsequent resolution, then the session falls back to the default bind
//! - [`MemoryStore`]: in-memory [`AuthoritativeStore`] for tests and development
//!
//! ## Example
//!
//! ```rust,ignore
//! use tollgate_routing::Binds;
//!
//! let binds = Binds::new(primary).with_replica(replica);
//! let mut session = binds.session();
//!
//! let conn = session.using_bind("replica").resolve()?; // replica
//! let conn = session.resolve()?;                       // primary again
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod memory;
mod session;

pub use memory::MemoryStore;
pub use session::{BindState, Binds, RoutingSession};

// Re-export the trait from core
pub use tollgate_core::traits::AuthoritativeStore;
