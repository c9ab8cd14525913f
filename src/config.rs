//! Application configuration.
//!
//! Defaults, optionally overlaid by a TOML file (`CONFIG_PATH`), then by
//! environment variables (a `.env` file is honoured via `dotenvy`).

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,
    #[serde(default = "default_storage_base_url")]
    pub storage_base_url: String,
    #[serde(default = "default_access_token_expire")]
    pub access_token_expire_sec: u64,
    #[serde(default = "default_refresh_token_expire")]
    pub refresh_token_expire_sec: u64,
    #[serde(default = "default_cleanup_interval")]
    pub blacklist_cleanup_interval_sec: u64,
}

fn default_storage_bucket() -> String { "invitation-images".into() }
fn default_storage_base_url() -> String { "https://storage.googleapis.com".into() }
fn default_access_token_expire() -> u64 { 3600 }
fn default_refresh_token_expire() -> u64 { 604_800 }
fn default_cleanup_interval() -> u64 { 300 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_bucket: default_storage_bucket(),
            storage_base_url: default_storage_base_url(),
            access_token_expire_sec: default_access_token_expire(),
            refresh_token_expire_sec: default_refresh_token_expire(),
            blacklist_cleanup_interval_sec: default_cleanup_interval(),
        }
    }
}

pub fn load_from_file(path: &str) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    AppConfig::from_toml_str(&content)
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `.env`, start from `CONFIG_PATH` (or defaults), apply environment
    /// overrides and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env file");
        }

        let mut cfg = match std::env::var("CONFIG_PATH") {
            Ok(path) => load_from_file(&path)?,
            Err(_) => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Overlay values produced by `lookup` (keyed by environment variable name).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("STORAGE_BUCKET") {
            self.storage_bucket = v;
        }
        if let Some(v) = lookup("STORAGE_BASE_URL") {
            self.storage_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("ACCESS_TOKEN_EXPIRE_SEC") {
            self.access_token_expire_sec = parse_secs("ACCESS_TOKEN_EXPIRE_SEC", v)?;
        }
        if let Some(v) = lookup("REFRESH_TOKEN_EXPIRE_SEC") {
            self.refresh_token_expire_sec = parse_secs("REFRESH_TOKEN_EXPIRE_SEC", v)?;
        }
        if let Some(v) = lookup("BLACKLIST_CLEANUP_INTERVAL_SEC") {
            self.blacklist_cleanup_interval_sec = parse_secs("BLACKLIST_CLEANUP_INTERVAL_SEC", v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("storage_bucket must not be empty".into()));
        }
        if self.storage_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("storage_base_url must not be empty".into()));
        }
        if self.access_token_expire_sec == 0 || self.refresh_token_expire_sec == 0 {
            return Err(ConfigError::Invalid("token lifetimes must be positive".into()));
        }
        if self.blacklist_cleanup_interval_sec == 0 {
            return Err(ConfigError::Invalid(
                "blacklist_cleanup_interval_sec must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expire_sec)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_expire_sec)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.blacklist_cleanup_interval_sec)
    }
}

fn parse_secs(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
