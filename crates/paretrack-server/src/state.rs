//! Shared application state for the Axum server.

use std::path::PathBuf;
use std::sync::Arc;

use paretrack_core::cache::DEFAULT_CACHE_CAPACITY;
use paretrack_core::FrontierCache;

#[derive(Clone)]
pub struct AppState {
    pub base_dir: Arc<PathBuf>,
    pub cache: FrontierCache,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            base_dir: Arc::new(config.base_dir.clone()),
            cache: FrontierCache::new(config.cache_capacity),
        }
    }
}

/// Configuration for the web server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub base_dir: PathBuf,
    pub host: String,
    pub port: u16,
    /// Entries kept per memoization table; 0 disables caching.
    pub cache_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("experiments"),
            host: "127.0.0.1".to_string(),
            port: 8000,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}
