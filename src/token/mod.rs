//! Signed identity tokens
//!
//! The token service drives the active provider's code or token exchange,
//! assembles the claims payload from the returned identities and signs it
//! with the service's RSA key (RS256).

use crate::manager::ConfigManager;
use crate::model::{Identity, ProviderToken};
use crate::telemetry;
use crate::utils::with_timeout;
use crate::{AuthBridgeError, Result};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Signing algorithm of issued tokens
const TOKEN_ALGORITHM: Algorithm = Algorithm::RS256;

/// Payload signed into every issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token kind reported by the provider
    pub token: String,

    /// Caller's account id in the external system
    pub account_id: String,

    /// Provider access token, presented later for refresh and lookups
    pub access_token: String,

    /// Ids of `identities`, in the same order
    #[serde(rename = "idList")]
    pub id_list: Vec<String>,

    pub identities: Vec<Identity>,

    /// Issued at (unix seconds)
    pub iat: i64,

    /// Expiration (unix seconds)
    pub exp: i64,
}

/// Build the claims for a provider token
pub fn build_claims(token: ProviderToken, issued_at: i64, expiry_secs: u64) -> TokenClaims {
    let id_list = token.identities.iter().map(|i| i.id.clone()).collect();
    TokenClaims {
        token: token.token_type,
        account_id: token.external_account_id,
        access_token: token.access_token,
        id_list,
        identities: token.identities,
        iat: issued_at,
        exp: issued_at.saturating_add(i64::try_from(expiry_secs).unwrap_or(i64::MAX)),
    }
}

// ============================================================================
// SIGNER
// ============================================================================

/// RSA signer and verifier for token claims
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: Option<DecodingKey>,
    expiry_secs: u64,
}

impl TokenSigner {
    /// Create a signer from PEM-encoded keys
    pub fn from_pem(private_pem: &[u8], public_pem: Option<&[u8]>, expiry_secs: u64) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|e| AuthBridgeError::signing(format!("invalid RSA private key: {}", e)))?;
        let decoding_key = public_pem
            .map(DecodingKey::from_rsa_pem)
            .transpose()
            .map_err(|e| AuthBridgeError::signing(format!("invalid RSA public key: {}", e)))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            expiry_secs,
        })
    }

    /// Create a signer from PEM key files
    pub fn from_files(
        private_key_file: &Path,
        public_key_file: Option<&Path>,
        expiry_secs: u64,
    ) -> Result<Self> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|e| {
                AuthBridgeError::signing(format!("cannot read key file {}: {}", path.display(), e))
            })
        };

        let private_pem = read(private_key_file)?;
        let public_pem = public_key_file.map(read).transpose()?;
        tracing::info!(file = %private_key_file.display(), "Loaded token signing key");

        Self::from_pem(&private_pem, public_pem.as_deref(), expiry_secs)
    }

    /// Lifetime of issued tokens
    pub fn expiry_secs(&self) -> u64 {
        self.expiry_secs
    }

    /// Sign claims into a compact JWS
    pub fn sign(&self, claims: &TokenClaims) -> Result<String> {
        encode(&Header::new(TOKEN_ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| AuthBridgeError::signing(format!("failed to sign token: {}", e)))
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        let decoding_key = self
            .decoding_key
            .as_ref()
            .ok_or_else(|| AuthBridgeError::signing("no public key configured"))?;

        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.set_required_spec_claims(&["exp"]);

        Ok(decode::<TokenClaims>(token, decoding_key, &validation)?.claims)
    }

    fn sign_provider_token(&self, token: ProviderToken) -> Result<String> {
        let claims = build_claims(token, Utc::now().timestamp(), self.expiry_secs);
        self.sign(&claims)
    }
}

// ============================================================================
// TOKEN SERVICE
// ============================================================================

/// Issues and refreshes signed tokens through the active provider
pub struct TokenService {
    manager: Arc<ConfigManager>,
    signer: Arc<TokenSigner>,
}

impl TokenService {
    pub fn new(manager: Arc<ConfigManager>, signer: Arc<TokenSigner>) -> Self {
        Self { manager, signer }
    }

    /// Exchange an authorization code for a signed token
    pub async fn create_token(&self, code: &str) -> Result<String> {
        let result = self.issue_from_code(code).await;
        telemetry::record_token("create", &result);
        result
    }

    async fn issue_from_code(&self, code: &str) -> Result<String> {
        let state = self
            .manager
            .active()
            .ok_or(AuthBridgeError::NoProviderConfigured)?;

        let token = with_timeout(
            self.manager.provider_timeout(),
            "exchanging authorization code",
            state.provider.generate_token(code),
        )
        .await?;

        tracing::debug!(account = %token.external_account_id, "Issuing token");
        self.signer.sign_provider_token(token)
    }

    /// Renew a provider access token and sign fresh claims
    pub async fn refresh_token(&self, access_token: &str) -> Result<String> {
        let result = self.issue_from_refresh(access_token).await;
        telemetry::record_token("refresh", &result);
        result
    }

    async fn issue_from_refresh(&self, access_token: &str) -> Result<String> {
        let state = self
            .manager
            .active()
            .ok_or(AuthBridgeError::NoProviderConfigured)?;

        let token = with_timeout(
            self.manager.provider_timeout(),
            "refreshing access token",
            state.provider.refresh_token(access_token),
        )
        .await?;

        tracing::debug!(account = %token.external_account_id, "Refreshing token");
        self.signer.sign_provider_token(token)
    }
}
