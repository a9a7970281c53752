//! Application settings and configuration

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Database configuration
    pub database: DatabaseSettings,
    /// Provider configuration
    #[serde(default)]
    pub provider: ProviderSettings,
    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,
    /// Engine settings
    #[serde(default)]
    pub engine: EngineSettings,
    /// Ticker universe settings
    #[serde(default)]
    pub universe: UniverseSettings,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

/// Provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// FMP configuration
    #[serde(default)]
    pub fmp: FmpSettings,
}

/// FMP provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FmpSettings {
    /// REST API base URL
    #[serde(default = "default_fmp_base_url")]
    pub base_url: String,
    /// Requests allowed per minute across all workers
    #[serde(default = "default_fmp_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Per-request timeout in seconds
    #[serde(default = "default_fmp_request_timeout")]
    pub request_timeout_secs: u64,
    /// Attempts per batch request before the error is surfaced
    #[serde(default = "default_fmp_max_attempts")]
    pub max_attempts: u32,
    /// Business days requested per API call
    #[serde(default = "default_fmp_batch_days")]
    pub batch_days: usize,
}

fn default_fmp_base_url() -> String {
    "https://financialmodelingprep.com/api/v3".to_string()
}

fn default_fmp_requests_per_minute() -> u32 {
    3000
}

fn default_fmp_request_timeout() -> u64 {
    10
}

fn default_fmp_max_attempts() -> u32 {
    2
}

fn default_fmp_batch_days() -> usize {
    3
}

impl Default for FmpSettings {
    fn default() -> Self {
        Self {
            base_url: default_fmp_base_url(),
            requests_per_minute: default_fmp_requests_per_minute(),
            request_timeout_secs: default_fmp_request_timeout(),
            max_attempts: default_fmp_max_attempts(),
            batch_days: default_fmp_batch_days(),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Rows per INSERT statement
    #[serde(default = "default_batch_size")]
    pub batch_insert_size: usize,
}

fn default_batch_size() -> usize {
    1000
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            batch_insert_size: default_batch_size(),
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Per-task timeout in seconds (covers fetch and insert separately)
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
    /// Default worker count for the concurrent command
    #[serde(default = "default_concurrent_threads")]
    pub concurrent_threads: usize,
    /// Default worker count for CSV injection
    #[serde(default = "default_csv_threads")]
    pub csv_threads: usize,
}

fn default_task_timeout() -> u64 {
    120
}

fn default_concurrent_threads() -> usize {
    6
}

fn default_csv_threads() -> usize {
    5
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            task_timeout_secs: default_task_timeout(),
            concurrent_threads: default_concurrent_threads(),
            csv_threads: default_csv_threads(),
        }
    }
}

/// Ticker universe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseSettings {
    /// JSON array of fallback tickers used when --tickers is omitted
    #[serde(default)]
    pub tickers_path: Option<String>,
    /// JSON array files classifying tickers per exchange, keyed by exchange name
    #[serde(default)]
    pub exchange_lists: std::collections::HashMap<String, String>,
    /// Number of fallback tickers taken from the universe file
    #[serde(default = "default_fallback_limit")]
    pub fallback_limit: usize,
}

fn default_fallback_limit() -> usize {
    5
}

impl Default for UniverseSettings {
    fn default() -> Self {
        Self {
            tickers_path: None,
            exchange_lists: std::collections::HashMap::new(),
            fallback_limit: default_fallback_limit(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_prefix("BACKFILL")
    }

    /// Load settings with a custom environment variable prefix
    pub fn load_with_prefix(env_prefix: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = Self::config_dir();

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Add environment-specific configuration
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Add local overrides (not checked into git)
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // Add environment variables (e.g., BACKFILL__DATABASE__URL)
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Get the configuration directory path
    fn config_dir() -> String {
        std::env::var("BACKFILL_CONFIG_DIR").unwrap_or_else(|_| "config".into())
    }

    /// Create default settings (useful for testing)
    pub fn default_settings() -> Self {
        Settings {
            database: DatabaseSettings {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/market_data".into()),
                max_connections: 10,
                min_connections: 2,
            },
            provider: ProviderSettings::default(),
            storage: StorageSettings::default(),
            engine: EngineSettings::default(),
            universe: UniverseSettings::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::default_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default_settings();
        assert_eq!(settings.database.max_connections, 10);
        assert_eq!(settings.storage.batch_insert_size, 1000);
        assert_eq!(settings.engine.concurrent_threads, 6);
        assert_eq!(settings.provider.fmp.batch_days, 3);
    }
}
