use super::*;
use crate::providers::static_directory::{DIRECTORY_SETTING, TOKEN_SECRET_SETTING};
use crate::utils::TestEnvironment;
use crate::settings::SettingsStore;

fn pairs(identities: &[Identity]) -> Vec<(String, String)> {
    identities
        .iter()
        .map(|i| (i.external_id_type.clone(), i.external_id.clone()))
        .collect()
}

// ========================================
// UPDATE
// ========================================

#[tokio::test]
async fn test_update_then_get_round_trips() {
    let env = TestEnvironment::new();
    let config = TestEnvironment::static_config(true);

    env.manager.update_config(config.clone()).await.unwrap();
    let stored = env.manager.get_config("").await.unwrap();

    assert_eq!(stored.resource_type, "config");
    assert_eq!(stored.provider, config.provider);
    assert_eq!(stored.enabled, config.enabled);
    assert_eq!(stored.access_mode, config.access_mode);
    assert_eq!(
        pairs(&stored.allowed_identities),
        pairs(&config.allowed_identities)
    );
    let static_config = stored.provider_field("staticConfig").unwrap();
    assert_eq!(static_config["users"][0]["login"], "alice");
}

#[tokio::test]
async fn test_get_config_redacts_credentials() {
    let env = TestEnvironment::new();
    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();

    let stored = env.manager.get_config("").await.unwrap();
    let rendered = serde_json::to_string(&stored).unwrap();

    assert!(!rendered.contains("authbridge-test-secret"));
    assert!(!rendered.contains("alice-code"));
    assert!(!rendered.contains("bob-code"));

    // The active provider still holds the real credentials
    let state = env.manager.active().unwrap();
    assert!(state.provider.generate_token("alice-code").await.is_ok());
}

#[tokio::test]
async fn test_posting_back_redacted_config_keeps_credentials() {
    let env = TestEnvironment::new();
    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();

    let mut redacted = env.manager.get_config("").await.unwrap();
    redacted.access_mode = "required".to_string();
    env.manager.update_config(redacted).await.unwrap();

    assert_eq!(
        env.store.value(TOKEN_SECRET_SETTING).as_deref(),
        Some("authbridge-test-secret")
    );
    assert!(env.store.value(DIRECTORY_SETTING).unwrap().contains("bob-code"));

    let state = env.manager.active().unwrap();
    assert_eq!(state.config.access_mode, "required");
    assert!(state.provider.generate_token("bob-code").await.is_ok());
}

#[tokio::test]
async fn test_redacted_config_without_stored_credentials_is_rejected() {
    let env = TestEnvironment::new();
    let mut config = TestEnvironment::static_config(true);
    let registry = ProviderRegistry::standard();
    registry
        .create("static")
        .unwrap()
        .redact_config(&mut config);

    let result = env.manager.update_config(config).await;

    assert!(matches!(result, Err(AuthBridgeError::InvalidConfig(_))));
    assert!(env.manager.active().is_none());
}

#[tokio::test]
async fn test_update_writes_generic_and_provider_settings() {
    let env = TestEnvironment::new();
    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();

    let value = |key: &str| env.store.value(key).unwrap_or_default();
    assert_eq!(value(ACCESS_MODE_SETTING), "restricted");
    assert_eq!(value(ALLOWED_IDENTITIES_SETTING), "static_group:devs");
    assert_eq!(value(SECURITY_SETTING), "true");
    assert_eq!(value(PROVIDER_NAME_SETTING), "static");
    assert_eq!(value(PROVIDER_SETTING), "static");
    assert_eq!(value(TOKEN_SECRET_SETTING), "authbridge-test-secret");
    assert!(value(DIRECTORY_SETTING).contains("alice-code"));
}

#[tokio::test]
async fn test_update_swaps_active_state() {
    let env = TestEnvironment::new();
    assert!(env.manager.active().is_none());

    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();

    let state = env.manager.active().unwrap();
    assert_eq!(state.provider.name(), "static");
    assert!(state.config.enabled);
}

#[tokio::test]
async fn test_update_with_empty_provider_keeps_state() {
    let env = TestEnvironment::new();
    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();
    let before = env.store.snapshot();

    let result = env.manager.update_config(AuthConfig::default()).await;

    assert!(matches!(result, Err(AuthBridgeError::InvalidRequest(_))));
    assert_eq!(env.manager.active().unwrap().config.access_mode, "restricted");
    assert_eq!(env.store.snapshot(), before);
}

#[tokio::test]
async fn test_update_rejects_unknown_access_mode() {
    let env = TestEnvironment::new();
    let mut config = TestEnvironment::static_config(true);
    config.access_mode = "everyone".to_string();

    let result = env.manager.update_config(config).await;
    assert!(matches!(result, Err(AuthBridgeError::InvalidRequest(_))));
    assert!(env.store.snapshot().is_empty());
}

#[tokio::test]
async fn test_update_with_invalid_provider_config_persists_nothing() {
    let env = TestEnvironment::new();
    let mut config = TestEnvironment::static_config(true);
    config.set_provider_field("staticConfig", serde_json::json!({"tokenSecret": "short"}));

    let result = env.manager.update_config(config).await;

    assert!(matches!(result, Err(AuthBridgeError::InvalidConfig(_))));
    assert!(env.store.snapshot().is_empty());
    assert!(env.manager.active().is_none());
}

#[tokio::test]
async fn test_update_with_unknown_provider() {
    let env = TestEnvironment::new();
    let result = env.manager.update_config(AuthConfig::new("github")).await;
    assert!(matches!(result, Err(AuthBridgeError::UnknownProvider(_))));
}

#[tokio::test]
async fn test_disabling_keeps_configured_provider_key() {
    let env = TestEnvironment::new();
    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();

    env.manager
        .update_config(TestEnvironment::static_config(false))
        .await
        .unwrap();

    assert_eq!(env.store.value(SECURITY_SETTING).as_deref(), Some("false"));
    assert_eq!(env.store.value(PROVIDER_SETTING).as_deref(), Some("static"));
    assert!(!env.manager.active().unwrap().config.enabled);
}

#[tokio::test]
async fn test_failed_write_leaves_previous_state() {
    let env = TestEnvironment::new();
    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();

    env.store.set_reject_writes(true);
    let mut config = TestEnvironment::static_config(false);
    config.access_mode = "required".to_string();
    let result = env.manager.update_config(config).await;

    assert!(matches!(result, Err(AuthBridgeError::Store(_))));
    let state = env.manager.active().unwrap();
    assert!(state.config.enabled);
    assert_eq!(state.config.access_mode, "restricted");
}

#[test]
fn test_blank_provider_values_are_not_written() {
    let config = TestEnvironment::static_config(false);
    let unconfigured = crate::providers::StaticProvider::default();

    let written = settings_for(&config, &unconfigured);

    assert!(!written.contains_key(TOKEN_SECRET_SETTING));
    assert!(written.contains_key(DIRECTORY_SETTING));
    assert!(!written.contains_key(PROVIDER_SETTING));
    assert_eq!(written.get(SECURITY_SETTING).map(String::as_str), Some("false"));
}

// ========================================
// GET / RELOAD
// ========================================

#[tokio::test]
async fn test_get_config_lenient_enabled_flag() {
    let env = TestEnvironment::new();
    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();
    env.store
        .update_setting(SECURITY_SETTING, "yes please")
        .await
        .unwrap();

    let config = env.manager.get_config("").await.unwrap();
    assert!(!config.enabled);
}

#[tokio::test]
async fn test_get_config_without_stored_provider() {
    let env = TestEnvironment::new();
    let result = env.manager.get_config("").await;
    assert!(matches!(result, Err(AuthBridgeError::UnknownProvider(_))));
}

#[tokio::test]
async fn test_get_config_resolves_allow_list_with_token() {
    let env = TestEnvironment::new();
    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();
    let access_token = env
        .manager
        .active()
        .unwrap()
        .provider
        .generate_token("bob-code")
        .await
        .unwrap()
        .access_token;

    let stubbed = env.manager.get_config("").await.unwrap();
    assert_eq!(stubbed.allowed_identities[0].name, "");

    let resolved = env.manager.get_config(&access_token).await.unwrap();
    assert_eq!(resolved.allowed_identities[0].id, "static_group:devs");
    assert_eq!(resolved.allowed_identities[0].name, "devs");
}

#[tokio::test]
async fn test_reload_activates_persisted_config() {
    let env = TestEnvironment::new();
    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();

    let restarted = TestEnvironment::with_store(env.store.as_ref().clone());
    assert!(restarted.manager.active().is_none());

    restarted.manager.reload().await.unwrap();
    let state = restarted.manager.active().unwrap();
    assert_eq!(state.provider.name(), "static");
    assert_eq!(state.config.access_mode, "restricted");
}

#[tokio::test]
async fn test_reload_aborts_on_read_failure() {
    let env = TestEnvironment::new();
    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();

    env.store.set_reject_reads(true);
    let result = env.manager.reload().await;

    assert!(matches!(result, Err(AuthBridgeError::Store(_))));
    assert!(env.manager.active().is_some());
}

// ========================================
// PASS-THROUGHS
// ========================================

#[tokio::test]
async fn test_pass_throughs_require_active_provider() {
    let env = TestEnvironment::new();

    assert!(matches!(
        env.manager.get_identities("t").await,
        Err(AuthBridgeError::NoProviderConfigured)
    ));
    assert!(matches!(
        env.manager.get_identity("alice", "static_user", "t").await,
        Err(AuthBridgeError::NoProviderConfigured)
    ));
    assert!(matches!(
        env.manager.search_identities("alice", true, "t").await,
        Err(AuthBridgeError::NoProviderConfigured)
    ));
}

#[tokio::test]
async fn test_pass_throughs_reach_provider() {
    let env = TestEnvironment::new();
    env.manager
        .update_config(TestEnvironment::static_config(true))
        .await
        .unwrap();
    let provider = env.manager.active().unwrap().provider.clone();
    let token = provider.generate_token("alice-code").await.unwrap().access_token;

    let mine = env.manager.get_identities(&token).await.unwrap();
    assert_eq!(mine.len(), 3);

    let bob = env
        .manager
        .get_identity("bob", "static_user", &token)
        .await
        .unwrap();
    assert_eq!(bob.name, "Bob Baker");

    let found = env
        .manager
        .search_identities("Bob Baker", true, &token)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}
