//! Editor configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::env::VarError;
use std::time::Duration;

use tracing::warn;

use crate::consts::{DEFAULT_PAGE_HEIGHT, DEFAULT_PAGE_WIDTH};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FONT_LOAD_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be an http(s) URL, got `{value}`")]
    InvalidUrl { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Template API root, without a trailing slash.
    pub api_base_url: String,
    /// Root that relative asset paths are joined onto.
    pub asset_base_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub font_load_timeout: Duration,
    /// Size of a fresh blank page.
    pub page_width: f64,
    pub page_height: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            asset_base_url: asset_root(DEFAULT_API_BASE_URL),
            api_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            font_load_timeout: Duration::from_millis(DEFAULT_FONT_LOAD_TIMEOUT_MS),
            page_width: DEFAULT_PAGE_WIDTH,
            page_height: DEFAULT_PAGE_HEIGHT,
        }
    }
}

impl EditorConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `CERT_API_BASE_URL`: default `http://127.0.0.1:8000/api`
    /// - `CERT_ASSET_BASE_URL`: default is the API base without its `/api` suffix
    /// - `CERT_API_TOKEN`: bearer token sent with API requests
    /// - `CERT_REQUEST_TIMEOUT_SECS`: default 30
    /// - `CERT_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CERT_FONT_LOAD_TIMEOUT_MS`: default 3000
    /// - `CERT_PAGE_WIDTH` / `CERT_PAGE_HEIGHT`: default 842 x 595
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] for a base URL that is not http(s).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_base_url = match get("CERT_API_BASE_URL") {
            Some(url) => http_url("CERT_API_BASE_URL", &url)?,
            None => DEFAULT_API_BASE_URL.to_string(),
        };
        let asset_base_url = match get("CERT_ASSET_BASE_URL") {
            Some(url) => http_url("CERT_ASSET_BASE_URL", &url)?,
            None => asset_root(&api_base_url),
        };

        Ok(Self {
            api_token: get("CERT_API_TOKEN"),
            request_timeout: Duration::from_secs(env_parse(&get, "CERT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)),
            connect_timeout: Duration::from_secs(env_parse(&get, "CERT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)),
            font_load_timeout: Duration::from_millis(env_parse(&get, "CERT_FONT_LOAD_TIMEOUT_MS", DEFAULT_FONT_LOAD_TIMEOUT_MS)),
            page_width: env_parse_dimension(&get, "CERT_PAGE_WIDTH", DEFAULT_PAGE_WIDTH),
            page_height: env_parse_dimension(&get, "CERT_PAGE_HEIGHT", DEFAULT_PAGE_HEIGHT),
            api_base_url,
            asset_base_url,
        })
    }
}

/// Read an environment variable. Unset is `None`; a value that is not valid
/// unicode is logged and treated as unset.
#[must_use]
pub fn env_var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) => Some(value),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(_)) => {
            warn!(key, "value is not valid unicode; ignored");
            None
        }
    }
}

fn http_url(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Ok(raw.trim_end_matches('/').to_string())
    } else {
        Err(ConfigError::InvalidUrl { var, value: raw.to_string() })
    }
}

/// Asset paths like `/uploads/x.png` are served from the API host root.
fn asset_root(api_base_url: &str) -> String {
    api_base_url.strip_suffix("/api").unwrap_or(api_base_url).to_string()
}

fn env_parse<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key).map(|v| v.parse::<T>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            warn!(key, "unparseable value; using default");
            default
        }
        None => default,
    }
}

fn env_parse_dimension(get: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    let value: f64 = env_parse(get, key, default);
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!(key, "page dimension must be positive; using default");
        default
    }
}
