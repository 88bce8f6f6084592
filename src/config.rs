use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_ID_PROBE_WINDOW: u32 = 1_000_000;

/// Application configuration, layered the same way the codebase this
/// service was built from layers its own `AppConfig`: `config/default.toml`,
/// then `config/{environment}.toml`, then `APP__`-prefixed environment
/// variables, with environment variables winning.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (1024-65535).
    #[serde(default = "default_port")]
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    /// Application environment: development, staging, production.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level.
    #[serde(default = "default_log_level", custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging) rather than human-readable.
    #[serde(default)]
    pub log_json: bool,

    /// Upper bound on how many candidate ids the [`crate::ids::IdMinter`]
    /// probes before wrapping back to zero. Exposed for tests that want a
    /// tighter window; production deployments use the full 1e6 range.
    #[serde(default = "default_id_probe_window")]
    #[validate(range(min = 1))]
    pub id_probe_window: u32,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_id_probe_window() -> u32 {
    DEFAULT_ID_PROBE_WINDOW
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the
/// default directive derived from `level` when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("inventorius_api={level},tower_http=debug");
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(EnvFilter::new(filter_directive)).json().try_init();
    } else {
        let _ = fmt().with_env_filter(EnvFilter::new(filter_directive)).try_init();
    }
}

/// Layers configuration sources in this order:
/// 1. Default config (`config/default.toml`)
/// 2. Environment-specific config (`config/{env}.toml`)
/// 3. Environment variables (`APP__*`)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("host", default_host())?
        .set_default("port", default_port() as i64)?
        .set_default("environment", default_environment())?
        .set_default("log_level", default_log_level())?
        .set_default("log_json", false)?
        .set_default("id_probe_window", default_id_probe_window() as i64)?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    let config = builder.build()?;
    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("configuration loaded successfully");
    Ok(app_config)
}
