use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

use crate::services::normalizer::ColumnSynonyms;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// The storage backend caps single-request row counts. This is an external
/// constraint on every chunked operation, not a tuning knob.
const DEFAULT_MAX_ROWS_PER_REQUEST: u64 = 1000;
const DEFAULT_RECENT_WINDOW: u64 = 50;
const DEFAULT_DEBOUNCE_MS: u64 = 250;
const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Bulk pipeline configuration: chunk sizing for import and page sizing for
/// export, both bounded by the backend's per-request row ceiling.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BulkConfig {
    /// Hard per-request row ceiling enforced by the store gateway
    #[serde(default = "default_max_rows_per_request")]
    #[validate(range(min = 1))]
    pub max_rows_per_request: u64,

    /// Import chunk size (clamped to the ceiling)
    #[serde(default = "default_max_rows_per_request")]
    #[validate(range(min = 1))]
    pub chunk_size: u64,

    /// Export page size (clamped to the ceiling)
    #[serde(default = "default_max_rows_per_request")]
    #[validate(range(min = 1))]
    pub page_size: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_rows_per_request: DEFAULT_MAX_ROWS_PER_REQUEST,
            chunk_size: DEFAULT_MAX_ROWS_PER_REQUEST,
            page_size: DEFAULT_MAX_ROWS_PER_REQUEST,
        }
    }
}

impl BulkConfig {
    /// Effective import chunk size, never above the backend ceiling.
    pub fn effective_chunk_size(&self) -> u64 {
        self.chunk_size.min(self.max_rows_per_request).max(1)
    }

    /// Effective export page size, never above the backend ceiling.
    pub fn effective_page_size(&self) -> u64 {
        self.page_size.min(self.max_rows_per_request).max(1)
    }
}

/// Live view configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    /// Number of rows kept in the "recent" window
    #[serde(default = "default_recent_window")]
    #[validate(range(min = 1))]
    pub recent_window: u64,

    /// Debounce window for coalescing change notifications (milliseconds)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Capacity of the change notification channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            recent_window: DEFAULT_RECENT_WINDOW,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Bulk import/export sizing
    #[serde(default)]
    #[validate]
    pub bulk: BulkConfig,

    /// Live view window and debounce
    #[serde(default)]
    #[validate]
    pub view: ViewConfig,

    /// Spreadsheet column synonyms accepted by the normalizer
    #[serde(default)]
    pub columns: ColumnSynonyms,
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_max_rows_per_request() -> u64 {
    DEFAULT_MAX_ROWS_PER_REQUEST
}

fn default_recent_window() -> u64 {
    DEFAULT_RECENT_WINDOW
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

/// Initializes the tracing subscriber with env-filter and optional JSON output.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("stocktake_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let registry = tracing_subscriber::registry().with(EnvFilter::new(filter_directive));

    if json {
        let _ = registry.with(fmt::layer().json()).try_init();
    } else {
        let _ = registry.with(fmt::layer()).try_init();
    }
}

/// Loads configuration from `config/{default,<env>}.toml` overridden by
/// `APP__`-prefixed environment variables, then validates it.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://stocktake.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("auto_migrate", true)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_sizes_are_clamped_to_the_backend_ceiling() {
        let bulk = BulkConfig {
            max_rows_per_request: 1000,
            chunk_size: 5000,
            page_size: 2500,
        };
        assert_eq!(bulk.effective_chunk_size(), 1000);
        assert_eq!(bulk.effective_page_size(), 1000);

        let bulk = BulkConfig {
            max_rows_per_request: 1000,
            chunk_size: 200,
            page_size: 500,
        };
        assert_eq!(bulk.effective_chunk_size(), 200);
        assert_eq!(bulk.effective_page_size(), 500);
    }

    #[test]
    fn defaults_track_the_nominal_ceiling() {
        let bulk = BulkConfig::default();
        assert_eq!(bulk.max_rows_per_request, 1000);
        assert_eq!(bulk.effective_chunk_size(), 1000);

        let view = ViewConfig::default();
        assert_eq!(view.recent_window, 50);
    }
}
