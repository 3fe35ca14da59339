//! Sampled StatsD metrics for the auth cache layer.
//!
//! Metric calls never fail and never change control flow. A disabled sink
//! drops everything without touching the network.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod statsd;

pub use statsd::Metrics;
