//! Configuration management for click-ledger
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::auth::RateLimitConfig;
use crate::models::DEFAULT_VALUE_PER_CLICK;

/// Prefix of every environment variable read by `Config::from_env`
pub const ENV_PREFIX: &str = "CLICK_LEDGER_";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Counter ledger configuration
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // First, expand environment variables in the YAML string
        let expanded = expand_env_vars(yaml);
        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables with prefix CLICK_LEDGER_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Server config from env
        if let Some(host) = env_var("SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_var("SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }
        if let Some(origins) = env_var("SERVER_CORS_ALLOWED_ORIGINS") {
            config.server.cors_allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        // Auth config from env
        if let Some(ttl) = env_var("AUTH_SESSION_TTL_SECS") {
            config.auth.session_ttl_secs = Some(
                ttl.parse()
                    .map_err(|_| ConfigError::Parse("Invalid session TTL".to_string()))?,
            );
        }
        if let Some(max) = env_var("AUTH_RATE_LIMIT_MAX_FAILURES") {
            config.auth.rate_limit.max_failures = max
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid rate limit max failures".to_string()))?;
        }
        if let Some(secs) = env_var("AUTH_RATE_LIMIT_BLOCK_DURATION_SECS") {
            config.auth.rate_limit.block_duration_secs = secs
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid rate limit block duration".to_string()))?;
        }
        if let Some(secs) = env_var("AUTH_RATE_LIMIT_WINDOW_DURATION_SECS") {
            config.auth.rate_limit.window_duration_secs = secs
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid rate limit window".to_string()))?;
        }

        // Ledger config from env
        if let Some(value) = env_var("LEDGER_DEFAULT_VALUE_PER_CLICK") {
            config.ledger.default_value_per_click = value
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid value per click".to_string()))?;
        }

        // Database config from env
        if let Some(path) = env_var("DATABASE_PATH") {
            config.database.path = path;
        }

        // Logging config from env
        if let Some(level) = env_var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = env_var("LOG_FORMAT") {
            config.logging.format = format;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.is_empty() {
            return Err(ConfigError::MissingRequired("database.path".to_string()));
        }
        if !self.ledger.default_value_per_click.is_finite() {
            return Err(ConfigError::InvalidValue(
                "ledger.default_value_per_click must be a finite number".to_string(),
            ));
        }
        if self.auth.rate_limit.max_failures == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.rate_limit.max_failures must be at least 1".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidValue(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, suffix)).ok()
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed to call the API from a browser (with credentials)
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: default_cors_allowed_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cors_allowed_origins() -> Vec<String> {
    vec!["https://phrasenschwein-front.vercel.app".to_string()]
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// Session lifetime in seconds (unset = sessions never expire)
    #[serde(default)]
    pub session_ttl_secs: Option<u64>,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: AuthRateLimitConfig,
}

impl AuthConfig {
    /// Settings for the authentication manager
    pub fn manager_config(&self) -> crate::auth::AuthConfig {
        crate::auth::AuthConfig {
            session_ttl: self.session_ttl_secs.map(Duration::from_secs),
            rate_limit: RateLimitConfig {
                max_failures: self.rate_limit.max_failures,
                block_duration: Duration::from_secs(self.rate_limit.block_duration_secs),
                window_duration: Duration::from_secs(self.rate_limit.window_duration_secs),
            },
        }
    }
}

/// Rate limiting configuration for failed logins
///
/// Failures are keyed on the TCP peer address. Behind a reverse proxy every
/// client shares the proxy's address, so all of their failures count toward
/// one shared limit and a block locks everyone out of login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthRateLimitConfig {
    /// Maximum number of failed attempts before blocking
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Duration to block after max failures (in seconds)
    #[serde(default = "default_block_duration")]
    pub block_duration_secs: u64,

    /// Window in which failures accumulate (in seconds)
    #[serde(default = "default_window_duration")]
    pub window_duration_secs: u64,
}

impl Default for AuthRateLimitConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            block_duration_secs: default_block_duration(),
            window_duration_secs: default_window_duration(),
        }
    }
}

fn default_max_failures() -> u32 {
    10
}

fn default_block_duration() -> u64 {
    300
}

fn default_window_duration() -> u64 {
    600
}

/// Counter ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    /// Value per click reported until one is stored
    #[serde(default = "default_value_per_click")]
    pub default_value_per_click: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_value_per_click: default_value_per_click(),
        }
    }
}

fn default_value_per_click() -> f64 {
    DEFAULT_VALUE_PER_CLICK
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// SQLite file path (`:memory:` for a throwaway database)
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "data/click-ledger.db".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (`json` or `pretty`)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax; unset variables are left as written.
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
