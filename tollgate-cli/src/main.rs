//! Tollgate CLI
//!
//! Operator tooling for the request-time auth cache layer: inspect and reset
//! daily counters, print the effective configuration, and soak the caches.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use tollgate_core::config::{FailurePolicy, GuardConfig};
use tollgate_core::traits::AuthoritativeStore;
use tollgate_core::types::{ApiKeyRecord, CounterKey, PermissionRecord, ServiceSnapshot};
use tollgate_counter::{CounterClient, MemoryBackend};
use tollgate_guard::{Guard, StoreBinds};
use tollgate_metrics::Metrics;
use tollgate_routing::MemoryStore;

/// Tollgate - request-time authentication & rate-limiting cache layer
#[derive(Parser)]
#[command(name = "tollgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Re-raise counter store failures instead of continuing without a count
    #[arg(long, global = true)]
    fail_closed: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration
    Config,

    /// Count one send for a service today
    Count {
        /// Service id
        service_id: Uuid,
    },

    /// Show today's send count for a service
    GetCount {
        /// Service id
        service_id: Uuid,
    },

    /// Reset today's send count for a service
    Reset {
        /// Service id
        service_id: Uuid,
    },

    /// Soak the caches with concurrent authorizations against an in-memory store
    Bench {
        /// Number of distinct services
        #[arg(short, long, default_value = "100")]
        services: usize,
        /// Total authorizations to run
        #[arg(short, long, default_value = "100000")]
        requests: usize,
        /// Concurrent workers
        #[arg(short, long, default_value = "16")]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "tollgate=debug,info"
    } else {
        "tollgate=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = GuardConfig::from_env().context("Invalid configuration")?;
    if cli.fail_closed {
        config.counter.failure_policy = FailurePolicy::Closed;
    }
    debug!(
        counter_enabled = config.counter.enabled,
        failure_policy = ?config.counter.failure_policy,
        metrics_enabled = config.metrics.enabled,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Config => cmd_config(&config),
        Commands::Count { service_id } => cmd_count(&config, service_id).await,
        Commands::GetCount { service_id } => cmd_get_count(&config, service_id).await,
        Commands::Reset { service_id } => cmd_reset(&config, service_id).await,
        Commands::Bench {
            services,
            requests,
            concurrency,
        } => cmd_bench(&config, services, requests, concurrency).await,
    }
}

/// Print effective configuration
fn cmd_config(config: &GuardConfig) -> Result<()> {
    println!("{}", "⚙️  Effective configuration".cyan().bold());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn counter_client(config: &GuardConfig) -> Result<CounterClient> {
    let client = CounterClient::from_config(&config.counter).context("Failed to configure counter store")?;
    if !client.is_enabled() {
        warn!("Counter store disabled");
        println!(
            "{}",
            "⚠️  Counter store disabled; set REDIS_ENABLED=true to use Redis".yellow()
        );
    }
    Ok(client)
}

/// Count one send
async fn cmd_count(config: &GuardConfig, service_id: Uuid) -> Result<()> {
    let client = counter_client(config)?;
    let key = CounterKey::daily_count(service_id);

    match client.increment_daily_count(service_id).await.context("Failed to increment counter")? {
        Some(count) => {
            info!(%service_id, count, "Counted send");
            println!("{} {} = {}", "✅".green(), key, count.to_string().bold());
        }
        None => {
            warn!(%service_id, "Send not counted");
            println!("{} {} not counted", "➖".dimmed(), key);
        }
    }
    Ok(())
}

/// Show today's count
async fn cmd_get_count(config: &GuardConfig, service_id: Uuid) -> Result<()> {
    let client = counter_client(config)?;
    let key = CounterKey::daily_count(service_id);

    let count = client.get_daily_count(service_id).await.context("Failed to read counter")?;
    debug!(%service_id, ?count, "Read daily count");
    println!("{} {}", key.to_string().dimmed(), count.unwrap_or(0).to_string().bold());
    Ok(())
}

/// Reset today's count
async fn cmd_reset(config: &GuardConfig, service_id: Uuid) -> Result<()> {
    let client = counter_client(config)?;
    let key = CounterKey::daily_count(service_id);

    client.delete(&key.render()).await.context("Failed to reset counter")?;
    info!(%service_id, key = %key, "Daily count reset");
    println!("{} {} reset", "✅".green(), key);
    Ok(())
}

/// Soak the caches
async fn cmd_bench(config: &GuardConfig, services: usize, requests: usize, concurrency: usize) -> Result<()> {
    let services = services.max(1);
    let concurrency = concurrency.max(1);
    println!(
        "{} {} authorizations over {} services ({} workers)",
        "📊 Soaking with".cyan().bold(),
        requests,
        services,
        concurrency
    );

    // Seed the replica
    let primary = Arc::new(MemoryStore::new("primary"));
    let replica = Arc::new(MemoryStore::new("replica"));
    let service_ids: Vec<Uuid> = (0..services).map(|_| Uuid::new_v4()).collect();
    for service_id in &service_ids {
        replica.upsert_service(
            *service_id,
            ServiceSnapshot {
                api_keys: vec![ApiKeyRecord::new(Uuid::new_v4(), "secret/bench")],
                permissions: vec![
                    PermissionRecord::new(PermissionRecord::EMAIL),
                    PermissionRecord::new(PermissionRecord::SMS),
                ],
                active: true,
            },
        );
    }

    let binds = StoreBinds::new(primary.clone() as Arc<dyn AuthoritativeStore>).with_replica(replica.clone());
    let counters = CounterClient::new(
        Arc::new(MemoryBackend::new()),
        config.counter.failure_policy,
        Duration::from_millis(config.counter.timeout_ms),
    );
    let metrics = Metrics::from_config(&config.metrics);
    let guard = Arc::new(Guard::new(binds, counters, metrics, &config.caches)?);
    let service_ids = Arc::new(service_ids);

    let pb = ProgressBar::new(requests as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("   [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut workers = JoinSet::new();
    for worker in 0..concurrency {
        let guard = guard.clone();
        let service_ids = service_ids.clone();
        let pb = pb.clone();
        let share = requests / concurrency + usize::from(worker < requests % concurrency);

        workers.spawn(async move {
            let mut denied = 0usize;
            for i in 0..share {
                let service_id = service_ids[(worker + i * concurrency) % service_ids.len()];
                if guard.authorize(service_id, PermissionRecord::SMS).await.is_err()
                    || guard.check_daily_limit(service_id, i64::MAX).await.is_err()
                {
                    denied += 1;
                }
                pb.inc(1);
            }
            denied
        });
    }

    let mut denied = 0;
    while let Some(result) = workers.join_next().await {
        denied += result.context("Worker panicked")?;
    }
    pb.finish();
    let elapsed = start.elapsed();
    info!(
        requests,
        denied,
        elapsed_ms = elapsed.as_millis() as u64,
        replica_queries = replica.queries(),
        "Soak finished"
    );

    println!("\n{}", "📈 Results:".green().bold());
    println!("   Elapsed: {:?}", elapsed);
    println!(
        "   Throughput: {:.0} authorizations/sec",
        requests as f64 / elapsed.as_secs_f64()
    );
    println!(
        "   Replica queries: {} (primary: {})",
        replica.queries(),
        primary.queries()
    );
    for (name, stats) in guard.cache_stats() {
        println!(
            "   {:<15} hit ratio {:>6.2}%  ({} hits, {} misses, {} expired)",
            name,
            stats.hit_ratio() * 100.0,
            stats.hits,
            stats.misses,
            stats.expirations
        );
    }
    guard.report_cache_sizes();

    if denied == 0 {
        println!("   {} Every request authorized", "✅".green());
    } else {
        println!("   {} {} requests denied", "❌".red(), denied);
    }

    Ok(())
}
