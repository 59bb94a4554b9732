//! Data model for authbridge
//!
//! Wire shapes exchanged with the control plane: auth configs, identities,
//! identity collections and the tokens returned by providers.

use crate::constants::{
    COLLECTION_RESOURCE_TYPE, CONFIG_RESOURCE_TYPE, IDENTITY_ID_SEPARATOR, IDENTITY_RESOURCE_TYPE,
};
use crate::{AuthBridgeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Flat key/value representation exchanged with the settings store
pub type SettingsMap = HashMap<String, String>;

fn config_resource_type() -> String {
    CONFIG_RESOURCE_TYPE.to_string()
}

fn identity_resource_type() -> String {
    IDENTITY_RESOURCE_TYPE.to_string()
}

// ============================================================================
// ACCESS MODE
// ============================================================================

/// Access policy tag carried by the auth config
///
/// The tag is stored and returned verbatim; authbridge only checks that it is
/// one of the documented values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Any identity the provider accepts may log in
    #[default]
    Unrestricted,
    /// Only allow-listed identities may log in
    Restricted,
    /// Allow-listed identities only, and authentication is mandatory
    Required,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Unrestricted => "unrestricted",
            AccessMode::Restricted => "restricted",
            AccessMode::Required => "required",
        }
    }
}

impl FromStr for AccessMode {
    type Err = AuthBridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "unrestricted" => Ok(AccessMode::Unrestricted),
            "restricted" => Ok(AccessMode::Restricted),
            "required" => Ok(AccessMode::Required),
            other => Err(AuthBridgeError::invalid_request(format!(
                "Unsupported access mode '{}'. Supported: unrestricted, restricted, required",
                other
            ))),
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// AUTH CONFIG
// ============================================================================

/// Authentication configuration as exposed on /authconfig
///
/// Provider-owned fields (for example `staticConfig`) are kept opaque in
/// `provider_config` and flattened into the JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(rename = "type", default = "config_resource_type")]
    pub resource_type: String,

    /// Registered provider name
    #[serde(default)]
    pub provider: String,

    /// Whether security is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Access policy tag (see [`AccessMode`])
    #[serde(default)]
    pub access_mode: String,

    /// Identities permitted to authenticate
    #[serde(default)]
    pub allowed_identities: Vec<Identity>,

    /// Provider-specific fields
    #[serde(flatten)]
    pub provider_config: Map<String, Value>,
}

impl AuthConfig {
    /// Create an empty config for a provider
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    /// Get a provider-specific field
    pub fn provider_field(&self, name: &str) -> Option<&Value> {
        self.provider_config.get(name)
    }

    /// Set a provider-specific field
    pub fn set_provider_field(&mut self, name: impl Into<String>, value: Value) {
        self.provider_config.insert(name.into(), value);
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            resource_type: config_resource_type(),
            provider: String::new(),
            enabled: false,
            access_mode: String::new(),
            allowed_identities: Vec::new(),
            provider_config: Map::new(),
        }
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

/// An external identity (user, group, org, ...) known to a provider
///
/// Identities compare equal when their `(external_id, external_id_type)`
/// pairs match; display fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub external_id: String,

    #[serde(default)]
    pub external_id_type: String,

    #[serde(default)]
    pub login: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile_picture: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile_url: String,

    #[serde(rename = "type", default = "identity_resource_type")]
    pub resource_type: String,
}

impl Identity {
    /// Create an identity with the conventional `type:externalId` id
    pub fn new(external_id_type: impl Into<String>, external_id: impl Into<String>) -> Self {
        let external_id_type = external_id_type.into();
        let external_id = external_id.into();
        Self {
            id: format!(
                "{}{}{}",
                external_id_type, IDENTITY_ID_SEPARATOR, external_id
            ),
            external_id,
            external_id_type,
            login: String::new(),
            name: String::new(),
            profile_picture: String::new(),
            profile_url: String::new(),
            resource_type: identity_resource_type(),
        }
    }

    /// Unresolved placeholder built from a raw allow-list entry
    pub fn stub(raw: &str, external_id_type: &str, external_id: &str) -> Self {
        Self {
            id: raw.to_string(),
            ..Self::new(external_id_type, external_id)
        }
    }

    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = login.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Entry written to the persisted allow-list
    pub fn allow_list_entry(&self) -> String {
        if self.id.is_empty() {
            format!(
                "{}{}{}",
                self.external_id_type, IDENTITY_ID_SEPARATOR, self.external_id
            )
        } else {
            self.id.clone()
        }
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.external_id == other.external_id && self.external_id_type == other.external_id_type
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.external_id.hash(state);
        self.external_id_type.hash(state);
    }
}

/// Collection envelope for identity lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub resource_type: String,
    pub data: Vec<Identity>,
}

impl IdentityCollection {
    pub fn new(data: Vec<Identity>) -> Self {
        Self {
            kind: COLLECTION_RESOURCE_TYPE.to_string(),
            resource_type: IDENTITY_RESOURCE_TYPE.to_string(),
            data,
        }
    }
}

// ============================================================================
// PROVIDER TOKEN
// ============================================================================

/// Result of a provider code exchange or token refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderToken {
    /// Token kind tag, copied into the signed claims
    pub token_type: String,

    /// Account id of the caller in the external system
    pub external_account_id: String,

    /// Provider access token the caller can present later
    pub access_token: String,

    /// The caller's identities, own identity first
    pub identities: Vec<Identity>,
}
