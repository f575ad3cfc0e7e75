//! Application state and configuration.

use std::sync::Arc;
use std::time::Duration;

use vigil_core::{Keys, QueryResolver, RedisStore, Store};

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "127.0.0.1:8080").
    pub bind_addr: String,

    /// Redis connection URL.
    pub redis_url: String,

    /// Key prefix shared with the indexing pipeline.
    pub prefix: String,

    /// Per-operation store timeout budget.
    pub store_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `VIGIL_BIND_ADDR`: Server bind address (default: "127.0.0.1:8080")
    /// - `REDIS_URL`: Redis URL (default: "redis://127.0.0.1:6379")
    /// - `VIGIL_PREFIX`: Index key prefix (default: "vigil")
    /// - `VIGIL_STORE_TIMEOUT_SECS`: Store operation timeout (default: 5)
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("VIGIL_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let prefix = std::env::var("VIGIL_PREFIX")
            .unwrap_or_else(|_| vigil_core::keys::DEFAULT_PREFIX.to_string());

        let store_timeout = match std::env::var("VIGIL_STORE_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("VIGIL_STORE_TIMEOUT_SECS must be an integer"))?
                    .max(1),
            ),
            Err(_) => vigil_core::store::DEFAULT_TIMEOUT,
        };

        tracing::info!(
            bind_addr = %bind_addr,
            redis_url = %redis_url,
            prefix = %prefix,
            store_timeout_secs = store_timeout.as_secs(),
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            redis_url,
            prefix,
            store_timeout,
        })
    }
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Stateless resolver over the shared index.
    pub resolver: QueryResolver,

    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Create application state over an already-connected store. Used
    /// directly by tests with an in-memory store.
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let resolver = QueryResolver::new(store, Keys::new(&config.prefix));
        Self {
            resolver,
            config: Arc::new(config),
        }
    }

    /// Connect to the configured Redis instance and build state over it.
    pub async fn connect(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(
            RedisStore::connect_with_timeout(&config.redis_url, config.store_timeout).await?,
        );
        Ok(Self::new(store, config))
    }
}
