//! Settings store backends
//!
//! The control plane keeps auth configuration as flat string settings. This
//! module defines the store trait, the in-memory and HTTP implementations and
//! the synchronizer that reads and writes batches of settings with deadlines.

pub mod http;
pub mod memory;

use crate::config::SettingsStoreConfig;
use crate::model::SettingsMap;
use crate::utils::with_timeout;
use crate::{AuthBridgeError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use http::HttpSettingsStore;
pub use memory::MemorySettingsStore;

/// Key/value settings persistence
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the active value of a setting; missing settings read as ""
    async fn get_setting(&self, key: &str) -> Result<String>;

    /// Write a single setting
    async fn update_setting(&self, key: &str, value: &str) -> Result<()>;

    /// Write a batch of settings
    ///
    /// The default writes key by key and stops at the first failure, which can
    /// leave earlier keys written. Stores with a batch primitive override it.
    async fn update_settings(&self, settings: &SettingsMap) -> Result<()> {
        let mut keys: Vec<&String> = settings.keys().collect();
        keys.sort();
        for key in keys {
            self.update_setting(key, &settings[key]).await?;
        }
        Ok(())
    }
}

/// Reads and writes settings batches against a store
#[derive(Clone)]
pub struct SettingsSynchronizer {
    store: Arc<dyn SettingsStore>,
    timeout: Duration,
}

impl SettingsSynchronizer {
    pub fn new(store: Arc<dyn SettingsStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Read every key; the first failing key aborts the read
    pub async fn read_settings<S: AsRef<str>>(&self, keys: &[S]) -> Result<SettingsMap> {
        let mut settings = SettingsMap::with_capacity(keys.len());
        for key in keys {
            let key = key.as_ref();
            let value = with_timeout(
                self.timeout,
                format!("reading setting {}", key),
                self.store.get_setting(key),
            )
            .await
            .inspect_err(|e| tracing::error!("Error reading the setting {}: {}", key, e))?;
            settings.insert(key.to_string(), value);
        }
        Ok(settings)
    }

    /// Persist a batch of settings
    pub async fn write_settings(&self, settings: &SettingsMap) -> Result<()> {
        tracing::debug!(keys = settings.len(), "Writing settings");
        with_timeout(
            self.timeout,
            "writing settings",
            self.store.update_settings(settings),
        )
        .await
        .inspect_err(|e| tracing::error!("Error writing settings: {}", e))
    }
}

/// Create a settings store from configuration
pub fn create_store_from_config(config: &SettingsStoreConfig) -> Result<Arc<dyn SettingsStore>> {
    match config.driver.as_str() {
        "memory" => {
            tracing::info!("Using in-memory settings store");
            Ok(Arc::new(MemorySettingsStore::new()))
        }
        "http" => {
            let url = config.url.as_deref().filter(|u| !u.is_empty()).ok_or_else(|| {
                AuthBridgeError::config("settingsStore.url is required for the http driver")
            })?;
            tracing::info!(url = %url, "Using HTTP settings store");
            Ok(Arc::new(HttpSettingsStore::new(
                url,
                config.access_key.clone(),
                config.secret_key.clone(),
            )?))
        }
        other => Err(AuthBridgeError::config(format!(
            "Unsupported settings store driver: {}. Supported: memory, http",
            other
        ))),
    }
}

#[cfg(test)]
mod settings_test;
