//! Configuration management for authbridge
//!
//! Loads and validates the service configuration from authbridge.config.json
//! (or a YAML file with the same shape).

use crate::constants::{
    DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT, DEFAULT_PROVIDER_TIMEOUT_MS, DEFAULT_STORE_TIMEOUT_MS,
    DEFAULT_TOKEN_EXPIRY_SECS,
};
use crate::{AuthBridgeError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete authbridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Token signing keys
    #[serde(default)]
    pub keys: KeysConfig,

    /// Settings store backend
    #[serde(default)]
    pub settings_store: SettingsStoreConfig,

    #[serde(default)]
    pub token: TokenConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Re-activate the persisted auth configuration at startup
    #[serde(default)]
    pub reload_on_startup: bool,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HTTP_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_HTTP_PORT
}

/// RSA key files used to sign and verify tokens
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_file: Option<PathBuf>,
}

/// Settings store backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsStoreConfig {
    /// Backend driver: memory or http
    #[serde(default = "default_store_driver")]
    pub driver: String,

    /// Base URL of the settings API (http driver)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
}

impl Default for SettingsStoreConfig {
    fn default() -> Self {
        Self {
            driver: default_store_driver(),
            url: None,
            access_key: None,
            secret_key: None,
        }
    }
}

fn default_store_driver() -> String {
    "memory".to_string()
}

/// Issued token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfig {
    /// Lifetime of signed tokens in seconds
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_expiry_secs(),
        }
    }
}

fn default_expiry_secs() -> u64 {
    DEFAULT_TOKEN_EXPIRY_SECS
}

/// Deadlines for outbound calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutsConfig {
    #[serde(default = "default_provider_ms")]
    pub provider_ms: u64,

    #[serde(default = "default_store_ms")]
    pub store_ms: u64,
}

impl TimeoutsConfig {
    pub fn provider(&self) -> Duration {
        Duration::from_millis(self.provider_ms)
    }

    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            provider_ms: default_provider_ms(),
            store_ms: default_store_ms(),
        }
    }
}

fn default_provider_ms() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_MS
}

fn default_store_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Write logs to this file instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from specific path
    ///
    /// Supports both JSON and YAML formats based on file extension:
    /// - `.yaml` or `.yml` files are parsed as YAML
    /// - anything else is parsed as JSON
    ///
    /// A missing file yields the defaults. `$env:VAR` references in store
    /// settings are expanded before validation.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;

        let mut config: Config = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
                AuthBridgeError::config(format!("Failed to parse YAML config: {}", e))
            })?,
            _ => serde_json::from_str(&content).map_err(|e| {
                AuthBridgeError::config(format!("Failed to parse JSON config: {}", e))
            })?,
        };

        config.expand_env();
        config.validate()?;

        Ok(config)
    }

    fn expand_env(&mut self) {
        let store = &mut self.settings_store;
        for value in [&mut store.url, &mut store.access_key, &mut store.secret_key]
            .into_iter()
            .flatten()
        {
            *value = expand_env_value(value);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.http.port == 0 {
            return Err(AuthBridgeError::config("http.port must be nonzero (1-65535)"));
        }
        if self.http.host.is_empty() {
            return Err(AuthBridgeError::config("http.host cannot be empty"));
        }

        match self.settings_store.driver.as_str() {
            "memory" => {}
            "http" => {
                let url = self.settings_store.url.as_deref().unwrap_or_default();
                if url.is_empty() {
                    return Err(AuthBridgeError::config(
                        "settingsStore.url is required when using the http driver",
                    ));
                }
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(AuthBridgeError::config(format!(
                        "Invalid settingsStore.url '{}': must start with http:// or https://",
                        url
                    )));
                }
            }
            other => {
                return Err(AuthBridgeError::config(format!(
                    "Unsupported settings store driver: '{}'. Supported: memory, http",
                    other
                )));
            }
        }

        if self.token.expiry_secs == 0 {
            return Err(AuthBridgeError::config(
                "token.expirySecs must be greater than 0",
            ));
        }
        if self.timeouts.provider_ms == 0 || self.timeouts.store_ms == 0 {
            return Err(AuthBridgeError::config(
                "timeouts.providerMs and timeouts.storeMs must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Expand `$env:VARNAME` references; unset variables expand to ""
pub fn expand_env_value(value: &str) -> String {
    static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\$env:([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid environment variable regex")
    });

    if !value.contains("$env:") {
        return value.to_string();
    }

    ENV_VAR_PATTERN
        .replace_all(value, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
