//! Vigil indexing daemon.
//!
//! Drains the proxy's event queue into the search index, then prunes
//! entries past the retention horizon. One-shot by default; pass
//! `--interval-secs` to keep running on a timer (an external scheduler
//! calling the one-shot form works just as well - runs need no mutual
//! exclusion).
//!
//! # Usage
//!
//! ```bash
//! # One run with defaults (queue "requests", 60-day retention)
//! vigil-index
//!
//! # Re-index every 5 minutes with a 30-day horizon
//! vigil-index --retention-days 30 --interval-secs 300
//! ```

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vigil_core::{Keys, RedisStore};
use vigil_index::{Indexer, IndexerConfig, RetryPolicy};

/// Vigil indexing daemon.
#[derive(Parser, Debug)]
#[command(name = "vigil-index")]
#[command(about = "Drain the event queue into the search index and prune expired entries")]
#[command(version)]
struct Args {
    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Source LIST the proxy appends events to
    #[arg(long, default_value = "requests")]
    source_key: String,

    /// Key prefix for every index structure
    #[arg(long, env = "VIGIL_PREFIX", default_value = "vigil")]
    prefix: String,

    /// Retention horizon in days
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..))]
    retention_days: u32,

    /// Queue entries drained per chunk
    #[arg(long, default_value_t = 500)]
    chunk: usize,

    /// Run forever, sleeping this many seconds between runs
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Path to .env file (optional)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(RedisStore::connect(&args.redis_url).await?);
    let indexer = Indexer::new(
        store,
        Keys::new(&args.prefix),
        IndexerConfig {
            source_key: args.source_key.clone(),
            retention_days: args.retention_days,
            chunk_size: args.chunk.max(1),
            retry: RetryPolicy::default(),
        },
    );

    match args.interval_secs {
        None => {
            indexer.run().await?;
        }
        Some(secs) => {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
            loop {
                ticker.tick().await;
                // A failed run is logged, not fatal; the next tick retries
                if let Err(err) = indexer.run().await {
                    tracing::error!(error = %err, "indexing run failed");
                }
            }
        }
    }

    Ok(())
}
