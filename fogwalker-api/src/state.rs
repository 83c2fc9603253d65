//! App state: server config, shared cache, upstream generator.

use std::sync::Arc;

use serde_json::Value;

use fogwalker_cache::{CacheConfig, TtlCache};
use fogwalker_core::{Result, TextGenerator};
use fogwalker_upstream::{OpenAiClient, UpstreamConfig};

/// Server configuration.
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    /// Upstream endpoint, credential, model and timeout
    pub upstream: UpstreamConfig,
    /// Shared cache configuration; unbounded unless a capacity is set
    pub cache: CacheConfig,
}

impl ServerConfig {
    /// Reads upstream settings plus `FOGWALKER_CACHE_MAX_ENTRIES`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let cache = std::env::var("FOGWALKER_CACHE_MAX_ENTRIES")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .map(CacheConfig::bounded)
            .unwrap_or_default();

        Self {
            upstream: UpstreamConfig::from_env(),
            cache,
        }
    }
}

/// Shared handler state.
///
/// Built once by the process entry point and handed to the router; handlers
/// never reach for a global cache.
pub struct AppState {
    /// Configuration the state was built from
    pub config: ServerConfig,
    /// Server shared cache of validated payloads
    pub cache: Arc<TtlCache<Value>>,
    /// Upstream text generator
    pub generator: Arc<dyn TextGenerator>,
}

impl AppState {
    /// Creates state with an OpenAI-compatible generator.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let generator = Arc::new(OpenAiClient::with_config(config.upstream.clone())?);
        Ok(Self::with_generator(config, generator))
    }

    /// Creates state around any generator.
    pub fn with_generator(config: ServerConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let cache = Arc::new(TtlCache::with_config(config.cache.clone()));
        Self {
            config,
            cache,
            generator,
        }
    }
}
