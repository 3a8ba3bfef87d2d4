//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration.
    pub redis: RedisConfig,
    /// Federation configuration.
    #[serde(default)]
    pub federation: FederationConfig,
    /// Follow relationship tuning.
    #[serde(default)]
    pub following: FollowingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Public URL of this instance, used to mint actor and activity URIs.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys and pub/sub channels.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Federation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Whether outbound federation delivery is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Follow relationship configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowingConfig {
    /// Maximum number of moved-from identities walked when checking whether a
    /// migrated follower was already approved under an old identity.
    #[serde(default = "default_max_alias_depth")]
    pub max_alias_depth: usize,
    /// Whether per-host follow statistics are maintained for remote instances.
    #[serde(default = "default_true")]
    pub enable_federated_instance_stats: bool,
    /// Seconds a cached followee-id set stays valid.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Maximum number of followers whose followee ids are cached.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for FollowingConfig {
    fn default() -> Self {
        Self {
            max_alias_depth: default_max_alias_depth(),
            enable_federated_instance_stats: true,
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of the human readable format.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "relgraph".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_max_alias_depth() -> usize {
    10
}

const fn default_cache_ttl_secs() -> u64 {
    300
}

const fn default_cache_capacity() -> usize {
    10_000
}

fn default_log_level() -> String {
    "relgraph=info".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `RELGRAPH_ENV`)
    /// 3. Environment variables with `RELGRAPH_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("RELGRAPH_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("RELGRAPH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("RELGRAPH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
