//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Feed connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

fn default_feed_url() -> String {
    "wss://pumpportal.fun/api/data".to_string()
}

fn default_reconnect_delay() -> u64 {
    3000 // 3 seconds
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

/// SOL/USD price oracle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_price_url")]
    pub url: String,

    #[serde(default = "default_price_refresh")]
    pub refresh_secs: u64,

    #[serde(default = "default_price_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_initial_price")]
    pub initial_price_usd: f64,
}

fn default_price_url() -> String {
    "https://api.coingecko.com/api/v3/simple/price?ids=solana&vs_currencies=usd".to_string()
}

fn default_price_refresh() -> u64 {
    60
}

fn default_price_timeout() -> u64 {
    10
}

fn default_initial_price() -> f64 {
    100.0
}

impl OracleConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            url: default_price_url(),
            refresh_secs: default_price_refresh(),
            timeout_secs: default_price_timeout(),
            initial_price_usd: default_initial_price(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("devwatch").to_string_lossy().to_string())
        .unwrap_or_else(|| "./devwatch_data".to_string())
}

impl StoreConfig {
    /// Data directory with a leading `~/` expanded
    pub fn data_path(&self) -> PathBuf {
        match (self.data_dir.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.data_dir),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_connections")]
    pub max_ws_connections: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    256
}

impl ApiConfig {
    /// Socket address string to bind
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_ws_connections: default_max_connections(),
        }
    }
}

/// Timer configuration for the engine's periodic work
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

fn default_tick_interval() -> u64 {
    1000
}

fn default_reconcile_interval() -> u64 {
    30
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            reconcile_interval_secs: default_reconcile_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("devwatch").join("config.toml")),
            Some(PathBuf::from("/etc/devwatch/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DEVWATCH_FEED_URL") {
            self.feed.url = url;
        }

        if let Ok(url) = std::env::var("DEVWATCH_PRICE_URL") {
            self.oracle.url = url;
        }

        if let Ok(data_dir) = std::env::var("DEVWATCH_DATA_DIR") {
            self.store.data_dir = data_dir;
        }

        if let Ok(host) = std::env::var("DEVWATCH_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("DEVWATCH_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        if let Ok(level) = std::env::var("DEVWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("DEVWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            oracle: OracleConfig::default(),
            store: StoreConfig::default(),
            api: ApiConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Dev Watch Configuration
#
# Environment variables override these settings:
# - DEVWATCH_FEED_URL
# - DEVWATCH_PRICE_URL
# - DEVWATCH_DATA_DIR
# - DEVWATCH_API_HOST
# - DEVWATCH_API_PORT
# - DEVWATCH_LOG_LEVEL
# - DEVWATCH_LOG_FORMAT

[feed]
# PumpPortal real-time WebSocket endpoint
url = "wss://pumpportal.fun/api/data"

# Delay before reconnecting after the feed closes (ms)
reconnect_delay_ms = 3000

[oracle]
# SOL/USD price endpoint (CoinGecko simple price)
url = "https://api.coingecko.com/api/v3/simple/price?ids=solana&vs_currencies=usd"

# How often to refresh the price (seconds)
refresh_secs = 60

# HTTP timeout (seconds)
timeout_secs = 10

# Price used until the first successful fetch
initial_price_usd = 100.0

[store]
# Directory holding followedDevs.json, trackedTokens.json and chartProvider.json
data_dir = "~/.local/share/devwatch"

[api]
# API server host
host = "127.0.0.1"

# API server port
port = 8090

# Request timeout in seconds
request_timeout_secs = 30

# Maximum concurrent dashboard WebSocket connections
max_ws_connections = 256

[scheduler]
# Elapsed-time refresh for dashboards (ms)
tick_interval_ms = 1000

# Panel reconciliation interval (seconds)
reconcile_interval_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
