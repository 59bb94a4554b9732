//! Error types for authbridge
//!
//! This module provides the error hierarchy using thiserror.
//! All errors can be converted to AuthBridgeError for unified error handling.

use thiserror::Error;

/// Main error type for authbridge operations
#[derive(Error, Debug)]
pub enum AuthBridgeError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unknown auth provider: {0}")]
    UnknownProvider(String),

    #[error("No auth provider configured")]
    NoProviderConfigured,

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),

    #[error("Token signing error: {0}")]
    Signing(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Settings store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read setting {key}: {message}")]
    Read { key: String, message: String },

    #[error("Failed to update setting {key}: {message}")]
    Write { key: String, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl From<jsonwebtoken::errors::Error> for AuthBridgeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AuthBridgeError::Signing(err.to_string())
    }
}

/// Convenient result type for authbridge operations
pub type Result<T> = std::result::Result<T, AuthBridgeError>;

impl AuthBridgeError {
    /// Create an invalid request error
    #[inline]
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        AuthBridgeError::InvalidRequest(msg.into())
    }

    /// Create an invalid provider config error
    #[inline]
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        AuthBridgeError::InvalidConfig(msg.into())
    }

    /// Create an auth failure
    #[inline]
    pub fn auth_failed<S: Into<String>>(msg: S) -> Self {
        AuthBridgeError::AuthFailed(msg.into())
    }

    /// Create a not found error
    #[inline]
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        AuthBridgeError::NotFound(msg.into())
    }

    /// Create a service configuration error
    #[inline]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        AuthBridgeError::Config(msg.into())
    }

    /// Create a signing error
    #[inline]
    pub fn signing<S: Into<String>>(msg: S) -> Self {
        AuthBridgeError::Signing(msg.into())
    }
}
