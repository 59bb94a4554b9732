//! Auth configuration manager
//!
//! Owns the process-wide active (provider, config) pair and keeps it in step
//! with the settings store. Readers take a cheap snapshot of the pair; writers
//! are serialized and only swap the pair after the new provider validated its
//! config and every setting was persisted.

use crate::constants::{
    ACCESS_MODE_SETTING, ALLOWED_IDENTITIES_SETTING, CONFIG_RESOURCE_TYPE, GENERIC_SETTINGS,
    PROVIDER_NAME_SETTING, PROVIDER_SETTING, SECURITY_SETTING,
};
use crate::model::{AccessMode, AuthConfig, Identity, SettingsMap};
use crate::providers::{IdentityProvider, ProviderRegistry};
use crate::resolver::{allowed_id_string, resolve_allowed_identities};
use crate::settings::SettingsSynchronizer;
use crate::telemetry;
use crate::utils::with_timeout;
use crate::{AuthBridgeError, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// One generation of the active provider and the config it was loaded from
pub struct ActiveState {
    pub provider: Arc<dyn IdentityProvider>,
    pub config: AuthConfig,
}

/// Coordinates provider (re)initialization with persisted settings
pub struct ConfigManager {
    sync: SettingsSynchronizer,
    registry: ProviderRegistry,
    active: RwLock<Option<Arc<ActiveState>>>,
    update_lock: Mutex<()>,
    provider_timeout: Duration,
}

impl ConfigManager {
    pub fn new(
        sync: SettingsSynchronizer,
        registry: ProviderRegistry,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            sync,
            registry,
            active: RwLock::new(None),
            update_lock: Mutex::new(()),
            provider_timeout,
        }
    }

    /// Deadline applied to provider calls
    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout
    }

    /// Snapshot of the active state, if any provider is configured
    pub fn active(&self) -> Option<Arc<ActiveState>> {
        self.active.read().clone()
    }

    fn active_provider(&self) -> Result<Arc<dyn IdentityProvider>> {
        self.active()
            .map(|state| state.provider.clone())
            .ok_or(AuthBridgeError::NoProviderConfigured)
    }

    fn swap(&self, provider: Arc<dyn IdentityProvider>, config: AuthConfig) {
        *self.active.write() = Some(Arc::new(ActiveState { provider, config }));
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    /// Validate, persist and activate a new configuration
    ///
    /// Nothing is persisted when the provider rejects the config, and the
    /// active state is left untouched unless every setting was written.
    pub async fn update_config(&self, config: AuthConfig) -> Result<()> {
        let result = self.apply_update(config).await;
        telemetry::record_config_change("update", &result);
        result
    }

    async fn apply_update(&self, mut config: AuthConfig) -> Result<()> {
        if config.provider.is_empty() {
            return Err(AuthBridgeError::invalid_request("provider is required"));
        }
        config.access_mode.parse::<AccessMode>()?;

        let _guard = self.update_lock.lock().await;

        // Credentials omitted by a redacted round trip keep their stored values
        let template = self.registry.create(&config.provider)?;
        let provider_keys = template.get_provider_setting_list();
        let stored = self.sync.read_settings(provider_keys.as_slice()).await?;
        template.restore_redacted(&mut config, &stored);

        let provider = self.registry.load(&config).inspect_err(|e| {
            tracing::error!("Cannot update the config, error initializing the provider: {}", e)
        })?;

        let settings = settings_for(&config, provider.as_ref());
        self.sync.write_settings(&settings).await?;

        tracing::info!(
            provider = %config.provider,
            enabled = config.enabled,
            "Auth configuration updated"
        );
        self.swap(provider, config);
        Ok(())
    }

    /// Read the persisted configuration with provider credentials redacted
    ///
    /// Allow-listed identities are resolved through the active provider when
    /// `access_token` is non-empty, and returned as stubs otherwise.
    pub async fn get_config(&self, access_token: &str) -> Result<AuthConfig> {
        let (template, mut config) = self.read_config(access_token).await?;
        template.redact_config(&mut config);
        Ok(config)
    }

    async fn read_config(
        &self,
        access_token: &str,
    ) -> Result<(Box<dyn IdentityProvider>, AuthConfig)> {
        let generic = self.sync.read_settings(&GENERIC_SETTINGS).await?;
        let setting = |key: &str| generic.get(key).cloned().unwrap_or_default();

        let provider_name = setting(PROVIDER_NAME_SETTING);
        tracing::debug!(provider = %provider_name, "Provider name in settings");

        let template = self.registry.create(&provider_name)?;
        let provider_keys = template.get_provider_setting_list();
        let provider_settings = self.sync.read_settings(provider_keys.as_slice()).await?;

        let active = self.active();
        let allowed_identities = resolve_allowed_identities(
            &setting(ALLOWED_IDENTITIES_SETTING),
            active.as_ref().map(|state| state.provider.as_ref()),
            access_token,
            self.provider_timeout,
        )
        .await;

        let mut config = AuthConfig {
            resource_type: CONFIG_RESOURCE_TYPE.to_string(),
            provider: provider_name,
            enabled: setting(SECURITY_SETTING).parse().unwrap_or(false),
            access_mode: setting(ACCESS_MODE_SETTING),
            allowed_identities,
            ..Default::default()
        };
        template.add_provider_config(&mut config, &provider_settings);

        Ok((template, config))
    }

    /// Re-initialize the active provider from persisted settings
    pub async fn reload(&self) -> Result<()> {
        let result = self.apply_reload().await;
        telemetry::record_config_change("reload", &result);
        result
    }

    async fn apply_reload(&self) -> Result<()> {
        let _guard = self.update_lock.lock().await;

        let (_, config) = self.read_config("").await?;
        let provider = self.registry.load(&config).inspect_err(|e| {
            tracing::error!("Error initializing the provider on reload: {}", e)
        })?;

        tracing::info!(provider = %config.provider, "Auth configuration reloaded");
        self.swap(provider, config);
        Ok(())
    }

    // ========================================================================
    // PROVIDER PASS-THROUGHS
    // ========================================================================

    /// Identities of the token holder
    pub async fn get_identities(&self, access_token: &str) -> Result<Vec<Identity>> {
        let provider = self.active_provider()?;
        with_timeout(
            self.provider_timeout,
            "listing identities",
            provider.get_identities(access_token),
        )
        .await
    }

    /// Look up a single identity
    pub async fn get_identity(
        &self,
        external_id: &str,
        external_id_type: &str,
        access_token: &str,
    ) -> Result<Identity> {
        let provider = self.active_provider()?;
        with_timeout(
            self.provider_timeout,
            "looking up identity",
            provider.get_identity(external_id, external_id_type, access_token),
        )
        .await
    }

    /// Search identities by name
    pub async fn search_identities(
        &self,
        name: &str,
        exact_match: bool,
        access_token: &str,
    ) -> Result<Vec<Identity>> {
        let provider = self.active_provider()?;
        with_timeout(
            self.provider_timeout,
            "searching identities",
            provider.search_identities(name, exact_match, access_token),
        )
        .await
    }
}

/// Flatten a config into the settings written on update
///
/// Empty provider values are dropped so a setting the provider leaves unset
/// keeps its stored value. The configured-provider switch is only written
/// when enabling.
fn settings_for(config: &AuthConfig, provider: &dyn IdentityProvider) -> SettingsMap {
    let mut settings: SettingsMap = provider
        .get_settings()
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect();

    settings.insert(ACCESS_MODE_SETTING.to_string(), config.access_mode.clone());
    settings.insert(
        ALLOWED_IDENTITIES_SETTING.to_string(),
        allowed_id_string(&config.allowed_identities),
    );
    settings.insert(SECURITY_SETTING.to_string(), config.enabled.to_string());
    settings.insert(PROVIDER_NAME_SETTING.to_string(), config.provider.clone());
    if config.enabled {
        settings.insert(PROVIDER_SETTING.to_string(), config.provider.clone());
    }

    settings
}

#[cfg(test)]
mod manager_test;
