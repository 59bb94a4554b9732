//! Utility functions and helpers
//!
//! Common utilities used throughout authbridge.

use crate::manager::ConfigManager;
use crate::model::AuthConfig;
use crate::providers::{ProviderRegistry, static_directory};
use crate::settings::{MemorySettingsStore, SettingsSynchronizer};
use crate::token::{TokenService, TokenSigner};
use crate::{AuthBridgeError, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Await `future`, failing with [`AuthBridgeError::Timeout`] after `duration`
pub async fn with_timeout<T, F>(duration: Duration, operation: impl Into<String>, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(AuthBridgeError::Timeout(format!(
            "{} after {}ms",
            operation.into(),
            duration.as_millis()
        ))),
    }
}

/// Directory holding the test key pair
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Test environment wired like production, backed by an in-memory store
///
/// # Example
///
/// ```no_run
/// use authbridge::utils::TestEnvironment;
///
/// #[tokio::test]
/// async fn my_test() {
///     let env = TestEnvironment::new();
///     env.manager.update_config(TestEnvironment::static_config(true)).await.unwrap();
///     let token = env.tokens.create_token("alice-code").await.unwrap();
/// }
/// ```
pub struct TestEnvironment {
    /// Settings store, inspectable and able to simulate failures
    pub store: Arc<MemorySettingsStore>,

    pub manager: Arc<ConfigManager>,

    pub tokens: Arc<TokenService>,

    /// Signer holding the fixture key pair
    pub signer: Arc<TokenSigner>,
}

impl TestEnvironment {
    /// Environment with an empty store and no active provider
    ///
    /// # Panics
    ///
    /// See [`TestEnvironment::with_store`].
    pub fn new() -> Self {
        Self::with_store(MemorySettingsStore::new())
    }

    /// Environment over a pre-populated store
    ///
    /// # Panics
    ///
    /// Panics when the fixture key pair under `tests/fixtures/` cannot be
    /// loaded.
    pub fn with_store(store: MemorySettingsStore) -> Self {
        let store = Arc::new(store);
        let sync = SettingsSynchronizer::new(store.clone(), Duration::from_secs(5));
        let manager = Arc::new(ConfigManager::new(
            sync,
            ProviderRegistry::standard(),
            Duration::from_secs(5),
        ));

        let fixtures = fixtures_dir();
        let signer = Arc::new(
            TokenSigner::from_files(
                &fixtures.join("test_private.pem"),
                Some(&fixtures.join("test_public.pem")),
                crate::constants::DEFAULT_TOKEN_EXPIRY_SECS,
            )
            .expect("Failed to load fixture keys"),
        );
        let tokens = Arc::new(TokenService::new(manager.clone(), signer.clone()));

        Self {
            store,
            manager,
            tokens,
            signer,
        }
    }

    /// Handler state over this environment
    pub fn app_state(&self) -> crate::http::AppState {
        crate::http::AppState::new(self.manager.clone(), self.tokens.clone())
    }

    /// A valid `static` provider config
    ///
    /// Users: `alice` (code `alice-code`, groups `admins`, `devs`) and
    /// `bob` (code `bob-code`, group `devs`). Allow-list: `static_group:devs`.
    pub fn static_config(enabled: bool) -> AuthConfig {
        let mut config = AuthConfig::new(static_directory::PROVIDER_NAME);
        config.enabled = enabled;
        config.access_mode = "restricted".to_string();
        config.allowed_identities = vec![crate::model::Identity::new(
            static_directory::GROUP_TYPE,
            "devs",
        )];
        config.set_provider_field(
            static_directory::CONFIG_FIELD,
            serde_json::json!({
                "tokenSecret": "authbridge-test-secret",
                "users": [
                    {"login": "alice", "name": "Alice Archer", "code": "alice-code", "groups": ["admins", "devs"]},
                    {"login": "bob", "name": "Bob Baker", "code": "bob-code", "groups": ["devs"]}
                ],
                "groups": [{"name": "admins"}, {"name": "devs"}]
            }),
        );
        config
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
