use chrono::NaiveDate;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub collector: CollectorConfig,
    pub cache: CacheConfig,
    pub database: DatabaseConfig,
    pub run: RunConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub max_concurrent_fetches: usize,
    pub pacing_ms: u64,
    pub request_timeout: u64,
    pub user_agent: String,
    #[serde(default)]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub region: String,
    /// Fixed logical date stamped on every record; today's UTC date when unset.
    #[serde(default)]
    pub captured_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub stores: Vec<StoreConfig>,
    pub products: Vec<String>,
    #[serde(default = "default_selectors")]
    pub default_selectors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub name: String,
    /// Search URL containing a `{q}` placeholder for the encoded product name.
    pub url_template: String,
    #[serde(default)]
    pub selectors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

fn default_retry_delay_ms() -> u64 {
    1000
}

pub fn default_selectors() -> Vec<String> {
    vec![
        ".price".to_string(),
        "[class*=\"price\"]".to_string(),
        ".product-price".to_string(),
    ]
}

impl CollectorConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl AppConfig {
    /// Loads configuration, layering run-mode and local overrides and
    /// `PRICES__*` environment variables on top of the base file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let base = match path {
            Some(path) => File::from(path),
            None => File::with_name("config/default"),
        };

        let s = Config::builder()
            .add_source(base)
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("PRICES").separator("__").try_parsing(true))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collector.max_concurrent_fetches == 0 {
            return Err(ConfigError::Message(
                "Collector max_concurrent_fetches must be greater than 0".into(),
            ));
        }

        if self.collector.request_timeout == 0 {
            return Err(ConfigError::Message(
                "Collector request_timeout must be greater than 0".into(),
            ));
        }

        if self.collector.user_agent.trim().is_empty() {
            return Err(ConfigError::Message("Collector user_agent must not be empty".into()));
        }

        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Message("Cache ttl_secs must be greater than 0".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if !self.database.url.starts_with("sqlite:") {
            return Err(ConfigError::Message("Database url must be a sqlite: URL".into()));
        }

        if self.run.region.trim().is_empty() {
            return Err(ConfigError::Message("Run region must not be empty".into()));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}
