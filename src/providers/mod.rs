//! Identity providers
//!
//! Defines the capability contract every provider variant implements and the
//! registry that turns a provider name into a fresh, unconfigured instance.
//! Adding a provider means registering a constructor; nothing else changes.

pub mod static_directory;

use crate::model::{AuthConfig, Identity, ProviderToken, SettingsMap};
use crate::{AuthBridgeError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use static_directory::StaticProvider;

/// Capability contract of an identity provider
///
/// Configuration methods are synchronous; token and identity lookups talk to
/// the external identity system and are async.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registered name of this provider
    fn name(&self) -> &str;

    /// Validate and absorb the provider-specific fields of a config
    fn load_config(&mut self, config: &AuthConfig) -> Result<()>;

    /// Export provider-specific fields as settings-store entries
    fn get_settings(&self) -> SettingsMap;

    /// Settings keys this provider needs re-read on reload
    fn get_provider_setting_list(&self) -> Vec<String>;

    /// Hydrate the provider-specific fields of a config from raw settings
    fn add_provider_config(&self, config: &mut AuthConfig, settings: &SettingsMap);

    /// Blank out credentials before a config is returned to a caller
    fn redact_config(&self, _config: &mut AuthConfig) {}

    /// Fill credentials left blank in an incoming config from the stored
    /// settings, so a redacted config can be posted back unchanged
    fn restore_redacted(&self, _config: &mut AuthConfig, _stored: &SettingsMap) {}

    /// Exchange an authorization code for an access token and identities
    async fn generate_token(&self, code: &str) -> Result<ProviderToken>;

    /// Renew a previously issued provider access token
    async fn refresh_token(&self, access_token: &str) -> Result<ProviderToken>;

    /// Look up a single identity
    async fn get_identity(
        &self,
        external_id: &str,
        external_id_type: &str,
        access_token: &str,
    ) -> Result<Identity>;

    /// Identities of the token holder
    async fn get_identities(&self, access_token: &str) -> Result<Vec<Identity>>;

    /// Search identities by name; `exact_match` must never return supersets
    async fn search_identities(
        &self,
        name: &str,
        exact_match: bool,
        access_token: &str,
    ) -> Result<Vec<Identity>>;
}

/// Constructor producing a zero-value provider instance
pub type ProviderConstructor = Arc<dyn Fn() -> Box<dyn IdentityProvider> + Send + Sync>;

/// Maps provider names to constructors
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: HashMap<String, ProviderConstructor>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(static_directory::PROVIDER_NAME, || {
            Box::new(StaticProvider::default())
        });
        registry
    }

    /// Register (or replace) a provider constructor
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn IdentityProvider> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered provider names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Create an unconfigured provider instance
    pub fn create(&self, name: &str) -> Result<Box<dyn IdentityProvider>> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| AuthBridgeError::UnknownProvider(name.to_string()))
    }

    /// Create the provider named by `config` and load the config into it
    pub fn load(&self, config: &AuthConfig) -> Result<Arc<dyn IdentityProvider>> {
        let mut provider = self.create(&config.provider)?;
        if let Err(e) = provider.load_config(config) {
            tracing::debug!(provider = %config.provider, "Error loading the provider config: {}", e);
            return Err(e);
        }
        Ok(Arc::from(provider))
    }
}
