//! Server configuration with environment overrides.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Configuration for the toolgate server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP address the server binds to.
    pub bind: SocketAddr,
    /// Detection cache time-to-live in seconds.
    pub cache_ttl_secs: u64,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Timeout applied when a request omits one.
    pub default_timeout_secs: u64,
    /// Upper bound on requested execution timeouts.
    pub max_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8181)),
            cache_ttl_secs: 300,
            max_body_size: 1024 * 1024, // 1MB
            default_timeout_secs: 30,
            max_timeout_secs: 300,
        }
    }
}

/// Load configuration from the environment, falling back to defaults for
/// anything unset or unparseable.
pub fn load_config_from_env() -> ServerConfig {
    let mut config = ServerConfig::default();

    if let Ok(bind) = std::env::var("TOOLGATE_BIND") {
        config.bind = bind.parse().unwrap_or(config.bind);
    }

    if let Ok(ttl) = std::env::var("TOOLGATE_CACHE_TTL_SECS") {
        config.cache_ttl_secs = ttl.parse().unwrap_or(config.cache_ttl_secs);
    }

    if let Ok(max_body) = std::env::var("TOOLGATE_MAX_BODY_SIZE") {
        config.max_body_size = max_body.parse().unwrap_or(config.max_body_size);
    }

    if let Ok(timeout) = std::env::var("TOOLGATE_DEFAULT_TIMEOUT") {
        config.default_timeout_secs = timeout.parse().unwrap_or(config.default_timeout_secs);
    }

    if let Ok(timeout) = std::env::var("TOOLGATE_MAX_TIMEOUT") {
        config.max_timeout_secs = timeout.parse().unwrap_or(config.max_timeout_secs);
    }

    config
}
