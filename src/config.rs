//! Service configuration
//!
//! Loaded from YAML (`config/config.yaml`, or the file named by
//! `CONFIG_PATH`). The listening port and store address can be overridden
//! with `PORT` and `STORE_URI`.

use std::fs;

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub graphql: GraphQLConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3002
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLConfig {
    /// Serve the GraphiQL explorer on `GET /graphql`
    #[serde(default = "default_true")]
    pub graphiql: bool,
    #[serde(default = "default_true")]
    pub introspection: bool,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_complexity")]
    pub max_complexity: usize,
    /// Upper bound on a whole request, store reads included
    #[serde(default = "default_query_timeout_seconds")]
    pub query_timeout_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> usize {
    10
}

fn default_max_complexity() -> usize {
    1000
}

fn default_query_timeout_seconds() -> u64 {
    10
}

impl Default for GraphQLConfig {
    fn default() -> Self {
        Self {
            graphiql: true,
            introspection: true,
            max_depth: default_max_depth(),
            max_complexity: default_max_complexity(),
            query_timeout_seconds: default_query_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Mongo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_uri")]
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub collections: CollectionNames,
    /// JSON seed file for the memory backend
    #[serde(default)]
    pub seed_path: Option<String>,
    /// Per-read timeout (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_store_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "proyecto".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            uri: default_store_uri(),
            database: default_database(),
            collections: CollectionNames::default(),
            seed_path: None,
            timeout_ms: default_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

/// Names of the document collections holding each entity kind
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionNames {
    #[serde(default = "default_profiles")]
    pub profiles: String,
    #[serde(default = "default_collections")]
    pub collections: String,
    #[serde(default = "default_associations")]
    pub associations: String,
}

fn default_profiles() -> String {
    "childrens".to_string()
}

fn default_collections() -> String {
    "collections".to_string()
}

fn default_associations() -> String {
    "subs".to_string()
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
            collections: default_collections(),
            associations: default_associations(),
        }
    }
}

/// Retry settings for store reads. One attempt means no retry.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| path.to_owned());
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let mut cfg = Self::from_yaml(&content)?;
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("invalid config file")
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {port}"))?;
        }
        if let Ok(uri) = std::env::var("STORE_URI") {
            self.store.uri = uri;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.app.name.is_empty() {
            anyhow::bail!("app.name is required");
        }
        if self.server.port == 0 {
            anyhow::bail!("server.port must be > 0");
        }
        if self.store.timeout_ms == 0 {
            anyhow::bail!("store.timeout_ms must be > 0");
        }
        if self.graphql.query_timeout_seconds == 0 {
            anyhow::bail!("graphql.query_timeout_seconds must be > 0");
        }
        if self.store.backend == StoreBackend::Mongo && !cfg!(feature = "mongo") {
            anyhow::bail!("store.backend = mongo requires the `mongo` feature");
        }
        Ok(())
    }
}
