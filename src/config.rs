use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_OTP_TTL_SECS: u64 = 600;
const DEFAULT_OTP_CODE_LENGTH: u32 = 6;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const CONFIG_DIR: &str = "config";

/// Application configuration with validation.
///
/// Values come from `config/default.toml`, an optional per-environment file,
/// and `ORDERFLOW_*` environment variables, in that order of precedence.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Deployment environment name ("development", "test", "production")
    #[serde(default = "default_env")]
    pub environment: String,

    /// Log level filter for the tracing subscriber
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// ISO currency code used for new carts and orders
    #[validate(length(min = 3, max = 3, message = "Currency must be 3 characters"))]
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Lifetime of an issued confirmation code, in seconds
    #[serde(default = "default_otp_ttl_secs")]
    pub otp_ttl_secs: u64,

    /// Number of digits in a confirmation code
    #[validate(range(min = 4, max = 10, message = "OTP length must be 4..=10 digits"))]
    #[serde(default = "default_otp_code_length")]
    pub otp_code_length: u32,

    /// Default TTL for cached promo listings, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Run migrations on startup (used by the test harness)
    #[serde(default)]
    pub auto_migrate: bool,

    /// Maximum database connections in the pool
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Minimum database connections in the pool
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
}

fn default_env() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_otp_ttl_secs() -> u64 {
    DEFAULT_OTP_TTL_SECS
}

fn default_otp_code_length() -> u32 {
    DEFAULT_OTP_CODE_LENGTH
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

impl AppConfig {
    /// Builds a configuration programmatically, used by tests and embedders.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            currency: default_currency(),
            otp_ttl_secs: default_otp_ttl_secs(),
            otp_code_length: default_otp_code_length(),
            cache_ttl_secs: default_cache_ttl_secs(),
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
        }
    }

    /// Loads configuration from files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ORDERFLOW_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let mut builder = Config::builder();
        let default_path = Path::new(CONFIG_DIR).join("default.toml");
        if default_path.exists() {
            builder = builder.add_source(File::from(default_path));
        }
        let env_path = Path::new(CONFIG_DIR).join(format!("{env}.toml"));
        if env_path.exists() {
            builder = builder.add_source(File::from(env_path));
        }
        builder = builder.add_source(Environment::with_prefix("ORDERFLOW").separator("__"));

        let cfg: AppConfig = builder.build()?.try_deserialize()?;
        cfg.validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn otp_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.otp_ttl_secs as i64)
    }
}
