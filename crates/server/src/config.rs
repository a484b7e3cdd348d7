//! # Application Configuration
//!
//! This module defines the configuration structure for `medreturn-server` and
//! the logic for loading it from a `config.yml` file and environment variables.
//!
//! Layers, lowest precedence first:
//! 1. Programmatic defaults.
//! 2. `config.yml` (or an explicit path), with `${VAR}` placeholders expanded.
//! 3. Plain environment variables for top-level keys (`PORT`, `DB_URL`).
//! 4. `MEDRETURN_` prefixed variables with `__` between nested keys
//!    (e.g. `MEDRETURN_CHATBOT__API_URL`).

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use tracing::{info, warn};

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates a required configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The secret used when nothing else is configured. Fine for local runs only.
pub const DEV_JWT_SECRET: &str = "medreturn-dev-secret-change-me";

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on. Loaded from `PORT` env var.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The path to the SQLite database file. Loaded from `DB_URL` env var.
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// Upper bound on concurrently checked-out database connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub chatbot: ChatbotConfig,
}

fn default_port() -> u16 {
    9090
}

fn default_db_url() -> String {
    "db/medreturn.db".to_string()
}

fn default_max_connections() -> usize {
    medreturn::constants::DEFAULT_MAX_CONNECTIONS
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,
}

fn default_access_ttl_minutes() -> i64 {
    30
}

fn default_refresh_ttl_days() -> i64 {
    30
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_ttl_minutes: default_access_ttl_minutes(),
            refresh_ttl_days: default_refresh_ttl_days(),
        }
    }
}

/// Legacy `X-User-Id` + `X-Session-Token` sessions.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl_hours")]
    pub ttl_hours: i64,
}

fn default_session_ttl_hours() -> i64 {
    24
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_session_ttl_hours(),
        }
    }
}

/// The external chatbot service.
#[derive(Debug, Deserialize, Clone)]
pub struct ChatbotConfig {
    #[serde(default = "default_chatbot_url")]
    pub api_url: String,
    #[serde(default = "default_chatbot_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_chatbot_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_chatbot_timeout() -> u64 {
    medreturn::constants::CHATBOT_TIMEOUT_SECS
}

fn default_history_limit() -> usize {
    medreturn::constants::CHATBOT_HISTORY_LIMIT
}

impl Default for ChatbotConfig {
    fn default() -> Self {
        Self {
            api_url: default_chatbot_url(),
            timeout_secs: default_chatbot_timeout(),
            history_limit: default_history_limit(),
        }
    }
}

/// Replaces every `${VAR}` with the variable's value, or nothing when unset.
pub fn substitute_env(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(format!("Invalid placeholder pattern: {e}")))?;
    let expanded = re.replace_all(content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });
    Ok(expanded.into_owned())
}

// Reads a file and substitutes env vars. Ok(None) if the file does not exist.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    substitute_env(&content).map(Some)
}

/// Loads the application configuration from a file and environment variables.
///
/// With an explicit path the file must exist. Without one, `config.yml` next
/// to the crate manifest is used when present, and defaults otherwise.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let base_path = env!("CARGO_MANIFEST_DIR");
    let mut builder = ConfigBuilder::builder();

    let main_content = match config_path_override {
        Some(path) => Some(read_and_substitute(path)?.ok_or_else(|| {
            ConfigError::NotFound(format!("Config file not found at '{path}'."))
        })?),
        None => {
            let user_config_path = format!("{base_path}/config.yml");
            let content = read_and_substitute(&user_config_path)?;
            if content.is_some() {
                info!("Loading configuration from '{user_config_path}'.");
            } else {
                info!("'{user_config_path}' not found. Using built-in defaults.");
            }
            content
        }
    };
    if let Some(content) = main_content {
        builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
    }

    let settings = builder
        // Top-level keys such as PORT and DB_URL.
        .add_source(Environment::default())
        .add_source(
            Environment::with_prefix("MEDRETURN")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let mut config: AppConfig = settings.try_deserialize()?;

    if config.jwt.secret.is_empty() {
        match env::var("JWT_SECRET_KEY") {
            Ok(secret) if !secret.is_empty() => config.jwt.secret = secret,
            _ => {
                warn!("No JWT secret configured; using the development secret.");
                config.jwt.secret = DEV_JWT_SECRET.to_string();
            }
        }
    }

    Ok(config)
}
