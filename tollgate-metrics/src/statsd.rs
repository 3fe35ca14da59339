//! StatsD client.
//!
//! Backed by a `cadence` UDP sink. Lines look like `prefix.name:1|c|@0.5` for
//! counters and `prefix.name:12|ms` for timings.

use std::future::Future;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Instant;

use cadence::prelude::*;
use cadence::{MetricError, StatsdClient, UdpMetricSink};
use rand::Rng;
use tracing::{debug, info, warn};

use tollgate_core::config::MetricsConfig;

/// Handle to the process-wide metrics sink.
///
/// Cheap to clone; clones share one client.
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    client: Option<Arc<StatsdClient>>,
}

impl Metrics {
    /// A sink that drops every sample.
    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// Builds the sink from configuration.
    ///
    /// Never fails: a target that cannot be resolved or a socket that cannot
    /// be opened is logged and yields a disabled sink.
    pub fn from_config(config: &MetricsConfig) -> Self {
        if !config.enabled {
            debug!("Metrics disabled");
            return Self::disabled();
        }

        match udp_client(config) {
            Ok(client) => {
                info!(host = %config.host, port = config.port, prefix = %config.prefix, "StatsD sink ready");
                Self {
                    client: Some(Arc::new(client)),
                }
            }
            Err(e) => {
                warn!(host = %config.host, port = config.port, error = %e, "StatsD sink unavailable, metrics disabled");
                Self::disabled()
            }
        }
    }

    /// Returns true if samples are actually sent.
    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Adds `count` to counter `name`, sampled at `rate`.
    pub fn incr(&self, name: &str, count: i64, rate: f64) {
        if let Some(client) = self.sampled(rate) {
            let builder = client.count_with_tags(name, count);
            if rate < 1.0 {
                builder.with_sampling_rate(rate).send();
            } else {
                builder.send();
            }
        }
    }

    /// Records a duration of `delta_seconds` for `name`, sampled at `rate`.
    pub fn timing(&self, name: &str, delta_seconds: f64, rate: f64) {
        if let Some(client) = self.sampled(rate) {
            let builder = client.time_with_tags(name, millis(delta_seconds));
            if rate < 1.0 {
                builder.with_sampling_rate(rate).send();
            } else {
                builder.send();
            }
        }
    }

    /// Sets gauge `name` to `value`. Gauges are never sampled.
    pub fn gauge(&self, name: &str, value: u64) {
        if let Some(client) = &self.client {
            client.gauge_with_tags(name, value).send();
        }
    }

    /// Awaits `fut` and records how long it took under `name`.
    pub async fn timed<F, T>(&self, name: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let output = fut.await;
        self.timing(name, start.elapsed().as_secs_f64(), 1.0);
        output
    }

    fn sampled(&self, rate: f64) -> Option<&StatsdClient> {
        let client = self.client.as_deref()?;
        if rate >= 1.0 {
            return Some(client);
        }
        if rate <= 0.0 || rand::thread_rng().gen::<f64>() >= rate {
            return None;
        }
        Some(client)
    }
}

fn udp_client(config: &MetricsConfig) -> Result<StatsdClient, MetricError> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_nonblocking(true)?;
    let sink = UdpMetricSink::from((config.host.as_str(), config.port), socket)?;

    Ok(StatsdClient::builder(&config.prefix, sink)
        .with_error_handler(|e| debug!(error = %e, "Dropped metric"))
        .build())
}

/// Whole milliseconds, rounded.
fn millis(delta_seconds: f64) -> u64 {
    (delta_seconds * 1000.0).round().max(0.0) as u64
}
