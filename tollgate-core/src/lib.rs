//! # Tollgate Core
//!
//! Core records, errors, configuration, and traits for the Tollgate
//! request-time authentication & rate-limiting cache layer.
//!
//! This crate provides the foundational building blocks used by all other Tollgate crates:
//!
//! - **Types**: API key, permission, and counter-key records
//! - **Errors**: One error taxonomy separating fatal, transient, and authorization outcomes
//! - **Constants**: Default TTLs, capacities, and counter-key formats
//! - **Config**: Serde-friendly configuration with environment loading
//! - **Traits**: The seams to the authoritative store and the counter backend
//!
//! ## Example
//!
//! ```rust
//! use tollgate_core::{CounterKey, CounterKind};
//! use chrono::NaiveDate;
//! use uuid::Uuid;
//!
//! let service_id = Uuid::nil();
//! let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let key = CounterKey::new(service_id, date, CounterKind::Count);
//! assert_eq!(
//!     key.to_string(),
//!     "00000000-0000-0000-0000-000000000000-2024-03-01-count"
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use config::*;
pub use constants::*;
pub use error::{GuardError, Result};
pub use traits::*;
pub use types::*;
