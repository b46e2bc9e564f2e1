//! Storefront Admin Configuration
//!
//! Layered configuration for the admin data layer:
//! 1. Built-in defaults
//! 2. Optional TOML file
//! 3. `SF_*` environment overrides
//!
//! ```toml
//! [api]
//! base_url = "https://api.example.com"
//! request_timeout_secs = 15
//!
//! [rate_limits.write]
//! capacity = 10
//! refill_per_second = 10
//!
//! [lists]
//! default_page_size = 25
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use sf_client::ApiConfig;
use sf_ratelimit::{BucketKind, RateLimitConfig};
use thiserror::Error;
use tracing::{debug, info};

pub const ENV_API_BASE_URL: &str = "SF_API_BASE_URL";
pub const ENV_API_TOKEN: &str = "SF_API_TOKEN";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SF_REQUEST_TIMEOUT_SECS";
pub const ENV_DEFAULT_PAGE_SIZE: &str = "SF_DEFAULT_PAGE_SIZE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Defaults applied to list synchronizers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListDefaults {
    pub default_page_size: u32,
}

impl Default for ListDefaults {
    fn default() -> Self {
        Self { default_page_size: 20 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub rate_limits: RateLimitConfig,
    pub lists: ListDefaults,
}

impl AppConfig {
    /// Defaults, then `path` if given, then process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&contents)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `SF_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            debug!(key = ENV_API_BASE_URL, "Overriding API base URL from environment");
            self.api.base_url = url;
        }
        if let Some(token) = lookup(ENV_API_TOKEN) {
            self.api.token = (!token.is_empty()).then_some(token);
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            self.api.request_timeout_secs = parse_env(ENV_REQUEST_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_PAGE_SIZE) {
            self.lists.default_page_size = parse_env(ENV_DEFAULT_PAGE_SIZE, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".to_string()));
        }
        if self.lists.default_page_size == 0 {
            return Err(ConfigError::Invalid("lists.default_page_size must be greater than 0".to_string()));
        }
        for kind in BucketKind::ALL {
            let bucket = self.rate_limits.get(kind);
            if bucket.capacity == 0 || bucket.refill_per_second == 0 {
                return Err(ConfigError::Invalid(format!(
                    "rate_limits.{} needs a non-zero capacity and refill_per_second",
                    kind
                )));
            }
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}
