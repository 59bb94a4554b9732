//! Static directory provider
//!
//! Configuration-driven identity provider for development and testing: users
//! and groups are declared in the auth config, authorization codes are fixed
//! per user, and access tokens are stateless HMAC-signed logins so they keep
//! working across provider reloads.

use super::IdentityProvider;
use crate::model::{AuthConfig, Identity, ProviderToken, SettingsMap};
use crate::{AuthBridgeError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashSet;

type HmacSha256 = Hmac<Sha256>;

/// Registered provider name
pub const PROVIDER_NAME: &str = "static";

/// Auth config field holding [`StaticConfig`]
pub const CONFIG_FIELD: &str = "staticConfig";

/// Settings key of the users/groups directory (JSON)
pub const DIRECTORY_SETTING: &str = "api.auth.static.directory";

/// Settings key of the access-token HMAC secret
pub const TOKEN_SECRET_SETTING: &str = "api.auth.static.token.secret";

/// Identity type of directory users
pub const USER_TYPE: &str = "static_user";

/// Identity type of directory groups
pub const GROUP_TYPE: &str = "static_group";

/// Token kind written into signed claims
pub const TOKEN_KIND: &str = "staticjwt";

const MIN_SECRET_LENGTH: usize = 16;

/// A directory user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticUser {
    pub login: String,

    #[serde(default)]
    pub name: String,

    /// Authorization code accepted for this user; never returned to callers
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,

    /// Names of the groups the user belongs to
    #[serde(default)]
    pub groups: Vec<String>,
}

/// A directory group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticGroup {
    pub name: String,
}

/// Users and groups, persisted as one JSON setting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticDirectory {
    #[serde(default)]
    pub users: Vec<StaticUser>,

    #[serde(default)]
    pub groups: Vec<StaticGroup>,
}

/// Value of the `staticConfig` field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_secret: String,

    #[serde(flatten)]
    pub directory: StaticDirectory,
}

impl StaticConfig {
    fn validate(&self) -> Result<()> {
        if self.token_secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthBridgeError::invalid_config(format!(
                "staticConfig.tokenSecret must be at least {} characters",
                MIN_SECRET_LENGTH
            )));
        }

        let mut group_names = HashSet::new();
        for group in &self.directory.groups {
            if group.name.is_empty() {
                return Err(AuthBridgeError::invalid_config(
                    "staticConfig.groups[].name cannot be empty",
                ));
            }
            if !group_names.insert(group.name.as_str()) {
                return Err(AuthBridgeError::invalid_config(format!(
                    "duplicate group '{}'",
                    group.name
                )));
            }
        }

        let mut logins = HashSet::new();
        let mut codes = HashSet::new();
        for user in &self.directory.users {
            if user.login.is_empty() {
                return Err(AuthBridgeError::invalid_config(
                    "staticConfig.users[].login cannot be empty",
                ));
            }
            if !logins.insert(user.login.as_str()) {
                return Err(AuthBridgeError::invalid_config(format!(
                    "duplicate user '{}'",
                    user.login
                )));
            }
            if user.code.is_empty() || !codes.insert(user.code.as_str()) {
                return Err(AuthBridgeError::invalid_config(format!(
                    "user '{}' needs a non-empty, unique code",
                    user.login
                )));
            }
            if let Some(missing) = user
                .groups
                .iter()
                .find(|g| !group_names.contains(g.as_str()))
            {
                return Err(AuthBridgeError::invalid_config(format!(
                    "user '{}' references undeclared group '{}'",
                    user.login, missing
                )));
            }
        }

        Ok(())
    }
}

/// Identity provider backed by a static directory
#[derive(Debug, Default)]
pub struct StaticProvider {
    config: StaticConfig,
}

impl StaticProvider {
    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.config.token_secret.as_bytes())
            .map_err(|e| AuthBridgeError::invalid_config(format!("invalid token secret: {}", e)))
    }

    /// Access token for a login: `base64url(login).hex(hmac(login))`
    fn mint_access_token(&self, login: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(login.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", URL_SAFE_NO_PAD.encode(login), signature))
    }

    /// Verify an access token and return its login
    fn verify_access_token(&self, access_token: &str) -> Result<String> {
        let invalid = || AuthBridgeError::auth_failed("invalid access token");

        let (encoded_login, signature) = access_token.split_once('.').ok_or_else(invalid)?;
        let login = URL_SAFE_NO_PAD
            .decode(encoded_login)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(invalid)?;
        let signature = hex::decode(signature).map_err(|_| invalid())?;

        let mut mac = self.mac()?;
        mac.update(login.as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        Ok(login)
    }

    fn user_by_login(&self, login: &str) -> Option<&StaticUser> {
        self.config.directory.users.iter().find(|u| u.login == login)
    }

    /// The user an access token belongs to
    fn token_owner(&self, access_token: &str) -> Result<&StaticUser> {
        let login = self.verify_access_token(access_token)?;
        self.user_by_login(&login)
            .ok_or_else(|| AuthBridgeError::auth_failed(format!("unknown account '{}'", login)))
    }

    fn user_identity(user: &StaticUser) -> Identity {
        let name = if user.name.is_empty() {
            user.login.as_str()
        } else {
            user.name.as_str()
        };
        Identity::new(USER_TYPE, &user.login)
            .with_login(&user.login)
            .with_name(name)
    }

    fn group_identity(name: &str) -> Identity {
        Identity::new(GROUP_TYPE, name).with_name(name)
    }

    /// Rebuild a config from the persisted settings
    fn stored_config(settings: &SettingsMap) -> StaticConfig {
        let directory = match settings.get(DIRECTORY_SETTING).filter(|s| !s.is_empty()) {
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed {} setting: {}", DIRECTORY_SETTING, e);
                StaticDirectory::default()
            }),
            None => StaticDirectory::default(),
        };
        StaticConfig {
            token_secret: settings
                .get(TOKEN_SECRET_SETTING)
                .cloned()
                .unwrap_or_default(),
            directory,
        }
    }

    fn parse_field(config: &AuthConfig) -> Option<StaticConfig> {
        let value = config.provider_field(CONFIG_FIELD)?;
        serde_json::from_value(value.clone()).ok()
    }

    fn set_field(config: &mut AuthConfig, static_config: &StaticConfig) {
        match serde_json::to_value(static_config) {
            Ok(value) => config.set_provider_field(CONFIG_FIELD, value),
            Err(e) => tracing::error!("Failed to encode {}: {}", CONFIG_FIELD, e),
        }
    }

    fn identities_of(user: &StaticUser) -> Vec<Identity> {
        std::iter::once(Self::user_identity(user))
            .chain(user.groups.iter().map(|g| Self::group_identity(g)))
            .collect()
    }

    fn provider_token(&self, user: &StaticUser) -> Result<ProviderToken> {
        Ok(ProviderToken {
            token_type: TOKEN_KIND.to_string(),
            external_account_id: user.login.clone(),
            access_token: self.mint_access_token(&user.login)?,
            identities: Self::identities_of(user),
        })
    }
}

fn name_matches(candidate: &str, query: &str, exact_match: bool) -> bool {
    if exact_match {
        candidate == query
    } else {
        candidate.to_lowercase().contains(&query.to_lowercase())
    }
}

#[async_trait]
impl IdentityProvider for StaticProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn load_config(&mut self, config: &AuthConfig) -> Result<()> {
        let value = config.provider_field(CONFIG_FIELD).ok_or_else(|| {
            AuthBridgeError::invalid_config(format!("{} is required", CONFIG_FIELD))
        })?;
        let parsed: StaticConfig = serde_json::from_value(value.clone()).map_err(|e| {
            AuthBridgeError::invalid_config(format!("malformed {}: {}", CONFIG_FIELD, e))
        })?;
        parsed.validate()?;
        self.config = parsed;
        Ok(())
    }

    fn get_settings(&self) -> SettingsMap {
        let mut settings = SettingsMap::new();
        match serde_json::to_string(&self.config.directory) {
            Ok(directory) => {
                settings.insert(DIRECTORY_SETTING.to_string(), directory);
            }
            Err(e) => tracing::error!("Failed to serialize static directory: {}", e),
        }
        settings.insert(
            TOKEN_SECRET_SETTING.to_string(),
            self.config.token_secret.clone(),
        );
        settings
    }

    fn get_provider_setting_list(&self) -> Vec<String> {
        vec![
            DIRECTORY_SETTING.to_string(),
            TOKEN_SECRET_SETTING.to_string(),
        ]
    }

    fn add_provider_config(&self, config: &mut AuthConfig, settings: &SettingsMap) {
        Self::set_field(config, &Self::stored_config(settings));
    }

    fn redact_config(&self, config: &mut AuthConfig) {
        let Some(mut static_config) = Self::parse_field(config) else {
            return;
        };
        static_config.token_secret.clear();
        for user in &mut static_config.directory.users {
            user.code.clear();
        }
        Self::set_field(config, &static_config);
    }

    fn restore_redacted(&self, config: &mut AuthConfig, stored: &SettingsMap) {
        // Malformed fields are left for load_config to reject
        let Some(mut incoming) = Self::parse_field(config) else {
            return;
        };
        let previous = Self::stored_config(stored);

        if incoming.token_secret.is_empty() {
            incoming.token_secret = previous.token_secret;
        }
        for user in incoming
            .directory
            .users
            .iter_mut()
            .filter(|u| u.code.is_empty())
        {
            if let Some(old) = previous.directory.users.iter().find(|o| o.login == user.login) {
                user.code = old.code.clone();
            }
        }
        Self::set_field(config, &incoming);
    }

    async fn generate_token(&self, code: &str) -> Result<ProviderToken> {
        if code.is_empty() {
            return Err(AuthBridgeError::auth_failed("empty authorization code"));
        }
        let user = self
            .config
            .directory
            .users
            .iter()
            .find(|u| u.code == code)
            .ok_or_else(|| AuthBridgeError::auth_failed("invalid authorization code"))?;

        tracing::debug!(login = %user.login, "Static provider accepted authorization code");
        self.provider_token(user)
    }

    async fn refresh_token(&self, access_token: &str) -> Result<ProviderToken> {
        let user = self.token_owner(access_token)?;
        self.provider_token(user)
    }

    async fn get_identity(
        &self,
        external_id: &str,
        external_id_type: &str,
        access_token: &str,
    ) -> Result<Identity> {
        self.token_owner(access_token)?;

        let identity = match external_id_type {
            USER_TYPE => self.user_by_login(external_id).map(Self::user_identity),
            GROUP_TYPE => self
                .config
                .directory
                .groups
                .iter()
                .find(|g| g.name == external_id)
                .map(|g| Self::group_identity(&g.name)),
            _ => None,
        };

        identity.ok_or_else(|| {
            AuthBridgeError::not_found(format!("{}:{}", external_id_type, external_id))
        })
    }

    async fn get_identities(&self, access_token: &str) -> Result<Vec<Identity>> {
        let user = self.token_owner(access_token)?;
        Ok(Self::identities_of(user))
    }

    async fn search_identities(
        &self,
        name: &str,
        exact_match: bool,
        access_token: &str,
    ) -> Result<Vec<Identity>> {
        self.token_owner(access_token)?;

        let users = self
            .config
            .directory
            .users
            .iter()
            .map(Self::user_identity)
            .filter(|i| {
                // Exact lookups compare the display name only
                name_matches(&i.name, name, exact_match)
                    || (!exact_match && name_matches(&i.login, name, false))
            });
        let groups = self
            .config
            .directory
            .groups
            .iter()
            .filter(|g| name_matches(&g.name, name, exact_match))
            .map(|g| Self::group_identity(&g.name));

        Ok(users.chain(groups).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn directory_config() -> AuthConfig {
        let mut config = AuthConfig::new(PROVIDER_NAME);
        config.set_provider_field(
            CONFIG_FIELD,
            json!({
                "tokenSecret": "0123456789abcdef0123",
                "users": [
                    {"login": "alice", "name": "Alice Liddell", "code": "alice-code", "groups": ["admins"]},
                    {"login": "bob", "code": "bob-code"},
                    {"login": "alicia", "name": "Alicia", "code": "alicia-code"}
                ],
                "groups": [{"name": "admins"}, {"name": "alice-fans"}]
            }),
        );
        config
    }

    fn loaded_provider() -> StaticProvider {
        let mut provider = StaticProvider::default();
        provider.load_config(&directory_config()).unwrap();
        provider
    }

    #[test]
    fn test_load_config_requires_field() {
        let mut provider = StaticProvider::default();
        let result = provider.load_config(&AuthConfig::new(PROVIDER_NAME));
        assert!(matches!(result, Err(AuthBridgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_config_rejects_short_secret() {
        let mut config = directory_config();
        config.set_provider_field(CONFIG_FIELD, json!({"tokenSecret": "short"}));
        let result = StaticProvider::default().load_config(&config);
        assert!(matches!(result, Err(AuthBridgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_config_rejects_undeclared_group() {
        let mut config = directory_config();
        config.set_provider_field(
            CONFIG_FIELD,
            json!({
                "tokenSecret": "0123456789abcdef",
                "users": [{"login": "carol", "code": "c", "groups": ["ops"]}]
            }),
        );
        let result = StaticProvider::default().load_config(&config);
        assert!(matches!(result, Err(AuthBridgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_config_rejects_duplicate_codes() {
        let mut config = directory_config();
        config.set_provider_field(
            CONFIG_FIELD,
            json!({
                "tokenSecret": "0123456789abcdef",
                "users": [{"login": "a", "code": "same"}, {"login": "b", "code": "same"}]
            }),
        );
        let result = StaticProvider::default().load_config(&config);
        assert!(matches!(result, Err(AuthBridgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_settings_round_trip_through_config() {
        let provider = loaded_provider();
        let settings = provider.get_settings();
        assert_eq!(settings.len(), 2);
        assert_eq!(
            settings.get(TOKEN_SECRET_SETTING).map(String::as_str),
            Some("0123456789abcdef0123")
        );

        let mut config = AuthConfig::new(PROVIDER_NAME);
        provider.add_provider_config(&mut config, &settings);

        let mut reloaded = StaticProvider::default();
        reloaded.load_config(&config).unwrap();
        assert_eq!(reloaded.config.directory.users.len(), 3);
        assert_eq!(reloaded.config.directory.groups.len(), 2);
    }

    #[test]
    fn test_add_provider_config_tolerates_garbage() {
        let provider = StaticProvider::default();
        let mut settings = SettingsMap::new();
        settings.insert(DIRECTORY_SETTING.to_string(), "{not json".to_string());

        let mut config = AuthConfig::new(PROVIDER_NAME);
        provider.add_provider_config(&mut config, &settings);

        let field = config.provider_field(CONFIG_FIELD).unwrap();
        assert_eq!(field["users"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_redact_config_hides_credentials() {
        let provider = loaded_provider();
        let mut config = AuthConfig::new(PROVIDER_NAME);
        provider.add_provider_config(&mut config, &provider.get_settings());

        provider.redact_config(&mut config);

        let field = config.provider_field(CONFIG_FIELD).unwrap();
        assert!(field.get("tokenSecret").is_none());
        for user in field["users"].as_array().unwrap() {
            assert!(user.get("code").is_none());
        }
        assert_eq!(field["users"][0]["login"], "alice");
        assert!(!field.to_string().contains("alice-code"));
    }

    #[test]
    fn test_restore_redacted_fills_blanks_from_stored_settings() {
        let provider = loaded_provider();
        let stored = provider.get_settings();

        let mut config = AuthConfig::new(PROVIDER_NAME);
        config.set_provider_field(
            CONFIG_FIELD,
            json!({
                "users": [
                    {"login": "alice", "name": "Alice Liddell", "groups": ["admins"]},
                    {"login": "bob", "code": "bob-new-code"},
                    {"login": "dave"}
                ],
                "groups": [{"name": "admins"}]
            }),
        );

        StaticProvider::default().restore_redacted(&mut config, &stored);

        let restored = StaticProvider::parse_field(&config).unwrap();
        assert_eq!(restored.token_secret, "0123456789abcdef0123");
        assert_eq!(restored.directory.users[0].code, "alice-code");
        assert_eq!(restored.directory.users[1].code, "bob-new-code");
        assert_eq!(restored.directory.users[2].code, "");

        // A new user still needs a code of their own
        assert!(matches!(
            StaticProvider::default().load_config(&config),
            Err(AuthBridgeError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_and_refresh_token() {
        let provider = loaded_provider();

        let token = provider.generate_token("alice-code").await.unwrap();
        assert_eq!(token.token_type, TOKEN_KIND);
        assert_eq!(token.external_account_id, "alice");
        assert_eq!(token.identities[0].id, "static_user:alice");
        assert_eq!(token.identities[1].id, "static_group:admins");

        let refreshed = provider.refresh_token(&token.access_token).await.unwrap();
        assert_eq!(refreshed.external_account_id, "alice");
        assert_eq!(refreshed.identities, token.identities);
    }

    #[tokio::test]
    async fn test_generate_token_rejects_unknown_code() {
        let provider = loaded_provider();
        let result = provider.generate_token("nope").await;
        assert!(matches!(result, Err(AuthBridgeError::AuthFailed(_))));
    }

    #[tokio::test]
    async fn test_tampered_token_is_rejected() {
        let provider = loaded_provider();
        let token = provider.generate_token("bob-code").await.unwrap();
        let (_, signature) = token.access_token.split_once('.').unwrap();
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode("alice"), signature);

        let result = provider.get_identities(&forged).await;
        assert!(matches!(result, Err(AuthBridgeError::AuthFailed(_))));
        assert!(provider.refresh_token("garbage").await.is_err());
    }

    #[tokio::test]
    async fn test_get_identity() {
        let provider = loaded_provider();
        let token = provider.generate_token("bob-code").await.unwrap().access_token;

        let alice = provider.get_identity("alice", USER_TYPE, &token).await.unwrap();
        assert_eq!(alice.name, "Alice Liddell");

        let admins = provider.get_identity("admins", GROUP_TYPE, &token).await.unwrap();
        assert_eq!(admins.id, "static_group:admins");

        let missing = provider.get_identity("zed", USER_TYPE, &token).await;
        assert!(matches!(missing, Err(AuthBridgeError::NotFound(_))));

        let wrong_type = provider.get_identity("alice", "org", &token).await;
        assert!(matches!(wrong_type, Err(AuthBridgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_exact_search_never_returns_supersets() {
        let provider = loaded_provider();
        let token = provider.generate_token("bob-code").await.unwrap().access_token;

        for query in ["alice", "Alice Liddell", "bob", "admins"] {
            let exact = provider.search_identities(query, true, &token).await.unwrap();
            for identity in &exact {
                assert_eq!(identity.name, query);
            }
        }

        let by_login = provider.search_identities("alice", true, &token).await.unwrap();
        assert!(by_login.is_empty());

        let by_name = provider
            .search_identities("Alice Liddell", true, &token)
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "static_user:alice");

        // Users without a display name are named after their login
        let bob = provider.search_identities("bob", true, &token).await.unwrap();
        assert_eq!(bob.len(), 1);

        let fuzzy = provider.search_identities("ALIC", false, &token).await.unwrap();
        let ids: Vec<&str> = fuzzy.iter().map(|i| i.id.as_str()).collect();
        assert!(ids.contains(&"static_user:alice"));
        assert!(ids.contains(&"static_user:alicia"));
        assert!(ids.contains(&"static_group:alice-fans"));
    }
}
