//! tiercache server
//!
//! Hosts the cache admin API over a configured cache manager and runs the
//! periodic expired-entry sweep.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tiercache::cache::{CacheConfig, CacheManager};
use tiercache::{admin, Error, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tiered cache server with an administrative HTTP API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Admin API bind address
    #[arg(long, env = "CACHE_ADDR", default_value = "0.0.0.0:8090")]
    addr: String,

    /// SQLite database path
    #[arg(long, env = "CACHE_DB_PATH", default_value = "cache.db")]
    db_path: PathBuf,

    /// Memory tier capacity in entries
    #[arg(long, env = "CACHE_MEMORY_CAPACITY", default_value = "1000")]
    memory_capacity: usize,

    /// Disable the persistent tier (volatile cache only)
    #[arg(long, env = "CACHE_MEMORY_ONLY")]
    memory_only: bool,

    /// Disable the memory tier (persistent cache only)
    #[arg(long, env = "CACHE_NO_MEMORY")]
    no_memory: bool,

    /// Seconds between expired-entry sweeps (0 disables)
    #[arg(long, env = "CACHE_CLEANUP_INTERVAL", default_value = "300")]
    cleanup_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting tiercache server");
    info!("  Admin API: {}", args.addr);
    info!("  Database: {}", args.db_path.display());
    info!("  Memory capacity: {} entries", args.memory_capacity);

    let config = CacheConfig {
        db_path: (!args.memory_only).then(|| args.db_path.clone()),
        memory_capacity: args.memory_capacity,
        enable_memory: !args.no_memory,
        enable_persistent: !args.memory_only,
        ..Default::default()
    };

    let manager = Arc::new(CacheManager::new(config)?);

    if args.cleanup_interval_secs > 0 {
        let sweeper = Arc::clone(&manager);
        let period = Duration::from_secs(args.cleanup_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                if let Err(e) = sweeper.cleanup_expired().await {
                    error!("Expired-entry sweep failed: {}", e);
                }
            }
        });
        info!("Cleanup sweep every {}s", args.cleanup_interval_secs);
    }

    let app = admin::router(manager)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = TcpListener::bind(&args.addr)
        .await
        .map_err(|e| Error::Configuration(format!("Invalid bind address {}: {}", args.addr, e)))?;

    info!("Admin API listening on {}", args.addr);
    axum::serve(listener, app).await?;

    info!("Server shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("tower=warn".parse().unwrap())
        .add_directive("axum=info".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
