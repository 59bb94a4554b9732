//! Constants used throughout authbridge
//!
//! Settings-store keys are a wire contract with the rest of the control plane:
//! other components read them directly, so their values must never change.

// ============================================================================
// SETTINGS STORE KEYS
// ============================================================================

/// Access mode policy tag (legacy key name kept for compatibility)
pub const ACCESS_MODE_SETTING: &str = "api.auth.github.access.mode";

/// Comma-joined `type:externalId` allow-list
pub const ALLOWED_IDENTITIES_SETTING: &str = "api.auth.github.allowed.identities";

/// Global switch naming the live provider; only written when enabling
pub const PROVIDER_SETTING: &str = "api.auth.provider.configured";

/// Name of the provider the stored configuration belongs to
pub const PROVIDER_NAME_SETTING: &str = "api.auth.provider.name.configured";

/// Whether security is enabled, stored as "true"/"false"
pub const SECURITY_SETTING: &str = "api.security.enabled";

/// Generic keys read back by every config load
pub const GENERIC_SETTINGS: [&str; 5] = [
    ACCESS_MODE_SETTING,
    ALLOWED_IDENTITIES_SETTING,
    SECURITY_SETTING,
    PROVIDER_SETTING,
    PROVIDER_NAME_SETTING,
];

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "authbridge.config.json";

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 8090;

/// Default HTTP host
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

/// Default signed token lifetime (16 hours)
pub const DEFAULT_TOKEN_EXPIRY_SECS: u64 = 16 * 60 * 60;

/// Default deadline for identity provider calls
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 10_000;

/// Default deadline for settings store calls
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 10_000;

/// Default log filter
pub const DEFAULT_LOG_FILTER: &str = "authbridge=info";

/// Log filter used with --debug
pub const DEBUG_LOG_FILTER: &str = "authbridge=debug";

// ============================================================================
// IDENTITY RESOURCES
// ============================================================================

/// Resource type tag of identity records
pub const IDENTITY_RESOURCE_TYPE: &str = "identity";

/// Resource type tag of auth config records
pub const CONFIG_RESOURCE_TYPE: &str = "config";

/// Resource type tag of collections
pub const COLLECTION_RESOURCE_TYPE: &str = "collection";

/// Separator between allow-list entries
pub const ALLOW_LIST_SEPARATOR: char = ',';

/// Separator between identity type and external id
pub const IDENTITY_ID_SEPARATOR: char = ':';

// ============================================================================
// HTTP
// ============================================================================

/// Bearer prefix of the Authorization header
pub const BEARER_PREFIX: &str = "Bearer ";
