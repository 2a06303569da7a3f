//! Application configuration management.

use std::time::Duration;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Analytics configuration.
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a connection before giving up.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    5
}

/// How the stock aggregator answers balance queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceStrategy {
    /// Keep an in-memory tally per key, updated once per accepted transaction.
    #[default]
    Cached,
    /// Stream the key's history from the store on every query.
    Recompute,
}

/// Ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Balance strategy used by the stock aggregator.
    #[serde(default)]
    pub balance_strategy: BalanceStrategy,
    /// Upper bound for a single store call, in milliseconds. Must be positive.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Largest page size accepted by history listings.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_store_timeout_ms() -> u64 {
    2_000
}

fn default_max_page_size() -> u32 {
    200
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            balance_strategy: BalanceStrategy::default(),
            store_timeout_ms: default_store_timeout_ms(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl LedgerConfig {
    /// Returns the store timeout as a `Duration`.
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Analytics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// How long a computed breakdown is served before it is recomputed. `0` disables caching.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Default number of rows returned by recent-transaction queries.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_refresh_interval_secs() -> u64 {
    10
}

fn default_recent_limit() -> usize {
    3
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            recent_limit: default_recent_limit(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `.env`, config files and the environment.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// then `LIFELINE__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or
    /// `ledger.store_timeout_ms` is zero.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("LIFELINE").separator("__"))
            .build()?;

        let app: Self = config.try_deserialize()?;
        if app.ledger.store_timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "ledger.store_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(app)
    }
}
