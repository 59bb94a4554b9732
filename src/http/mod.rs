//! HTTP server for authbridge
//!
//! Thin adapters over the config manager and token service: parse the
//! request, call the core, map the outcome to a status and body.

pub mod response;

use self::response::{write_http_error, write_http_json};
use crate::config::Config;
use crate::constants::BEARER_PREFIX;
use crate::manager::ConfigManager;
use crate::model::{AuthConfig, IdentityCollection};
use crate::providers::ProviderRegistry;
use crate::settings::{SettingsSynchronizer, create_store_from_config};
use crate::token::{TokenService, TokenSigner};
use crate::{AuthBridgeError, Result};
use axum::{
    Router,
    extract::{Json, MatchedPath, Query, Request, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    LatencyUnit,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConfigManager>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(manager: Arc<ConfigManager>, tokens: Arc<TokenService>) -> Self {
        Self { manager, tokens }
    }

    /// Wire the settings store, provider registry and signer from config
    ///
    /// Fails when the signing key cannot be loaded.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = create_store_from_config(&config.settings_store)?;
        let sync = SettingsSynchronizer::new(store, config.timeouts.store());
        let manager = Arc::new(ConfigManager::new(
            sync,
            ProviderRegistry::standard(),
            config.timeouts.provider(),
        ));

        let private_key_file = config.keys.private_key_file.as_deref().ok_or_else(|| {
            AuthBridgeError::config("keys.privateKeyFile (or --private-key-file) is required")
        })?;
        let signer = Arc::new(TokenSigner::from_files(
            private_key_file,
            config.keys.public_key_file.as_deref(),
            config.token.expiry_secs,
        )?);

        let tokens = Arc::new(TokenService::new(manager.clone(), signer));
        Ok(Self::new(manager, tokens))
    }
}

/// Error type for HTTP handlers
///
/// Carries the status chosen by the handler and an optional public message.
/// Server errors are logged in full and answered with the public message only.
#[derive(Debug)]
pub struct AppError {
    error: AuthBridgeError,
    status: StatusCode,
    message: Option<&'static str>,
}

impl AppError {
    /// Override the status code
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Replace the error text shown to the client
    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }
}

/// Default status for an error kind
fn default_status(error: &AuthBridgeError) -> StatusCode {
    match error {
        AuthBridgeError::InvalidRequest(_) | AuthBridgeError::InvalidConfig(_) => {
            StatusCode::BAD_REQUEST
        }
        AuthBridgeError::Unauthorized(_) | AuthBridgeError::AuthFailed(_) => {
            StatusCode::UNAUTHORIZED
        }
        AuthBridgeError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.status.is_server_error() {
            tracing::error!(status = %self.status, "Request failed: {}", self.error);
            self.message
                .unwrap_or("An internal error occurred")
                .to_string()
        } else {
            tracing::debug!(status = %self.status, "Request rejected: {}", self.error);
            self.message
                .map(str::to_string)
                .unwrap_or_else(|| self.error.to_string())
        };

        write_http_error(message, self.status)
    }
}

impl<E> From<E> for AppError
where
    E: Into<AuthBridgeError>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        Self {
            status: default_status(&error),
            error,
            message: None,
        }
    }
}

type HandlerResult = std::result::Result<Response, AppError>;

/// Extract the caller token from `Authorization: Bearer <token>`
///
/// `Ok(None)` when the header is absent; a header without the bearer prefix
/// is `Unauthorized`.
fn bearer_token(headers: &HeaderMap) -> Result<Option<String>> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthBridgeError::Unauthorized("malformed Authorization header".into()))?;
    value
        .strip_prefix(BEARER_PREFIX)
        .map(|token| Some(token.to_string()))
        .ok_or_else(|| AuthBridgeError::Unauthorized("expected a Bearer token".into()))
}

/// Bearer token for endpoints that require one
fn required_bearer_token(headers: &HeaderMap) -> std::result::Result<String, AppError> {
    let unauthorized = |e: AuthBridgeError| {
        AppError::from(e).with_message("Unauthorized, please provide a valid token")
    };

    match bearer_token(headers) {
        Ok(Some(token)) if !token.is_empty() => Ok(token),
        Ok(_) => Err(unauthorized(AuthBridgeError::Unauthorized(
            "missing bearer token".into(),
        ))),
        Err(e) => Err(unauthorized(e)),
    }
}

// ============================================================================
// SERVER
// ============================================================================

/// Start the HTTP server
pub async fn start_server(config: &Config, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|e| AuthBridgeError::config(format!("Invalid address {}: {}", addr, e)))?;

    let app = build_router(state);

    tracing::info!("Starting HTTP server on {}", socket_addr);

    let listener = tokio::net::TcpListener::bind(socket_addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| AuthBridgeError::config(format!("Server error: {}", e)))?;

    Ok(())
}

/// Build the router with all endpoints
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/token", post(create_token_handler))
        .route("/me/identities", get(my_identities_handler))
        .route("/identities", get(search_identities_handler))
        .route(
            "/authconfig",
            get(get_config_handler).post(update_config_handler),
        )
        .route("/reloadconfig", post(reload_handler))
        .with_state(state);

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(auth_routes)
        .route_layer(middleware::from_fn(record_request_metrics))
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new())
                    .on_response(
                        DefaultOnResponse::new()
                            .level(tracing::Level::INFO)
                            .latency_unit(LatencyUnit::Micros),
                    ),
            ),
        )
}

async fn record_request_metrics(request: Request, next: Next) -> Response {
    let handler = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    crate::telemetry::record_http_request(&handler, response.status().as_u16());
    response
}

// ============================================================================
// TOKEN HANDLERS
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest {
    #[serde(default)]
    code: String,

    #[serde(default)]
    access_token: String,
}

/// POST /token
///
/// `code` takes precedence over `accessToken` when both are set.
async fn create_token_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<TokenRequest>, JsonRejection>,
) -> HandlerResult {
    let bad_request = |e: AuthBridgeError| {
        AppError::from(e).with_message("Bad Request, Please check the request content")
    };

    let Json(request) =
        body.map_err(|e| bad_request(AuthBridgeError::invalid_request(e.body_text())))?;

    let signed = if !request.code.is_empty() {
        state.tokens.create_token(&request.code).await
    } else if !request.access_token.is_empty() {
        state.tokens.refresh_token(&request.access_token).await
    } else {
        return Err(bad_request(AuthBridgeError::invalid_request(
            "either code or accessToken is required",
        )));
    };

    let token = signed.map_err(|e| {
        AppError::from(e)
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            .with_message("Error getting the token")
    })?;

    Ok(write_http_json(token))
}

// ============================================================================
// IDENTITY HANDLERS
// ============================================================================

/// GET /me/identities
async fn my_identities_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> HandlerResult {
    let access_token = required_bearer_token(&headers)?;

    let identities = state
        .manager
        .get_identities(&access_token)
        .await
        .map_err(|e| {
            AppError::from(e)
                .with_status(StatusCode::UNAUTHORIZED)
                .with_message("Unauthorized, failed to get identities")
        })?;

    Ok(write_http_json(IdentityCollection::new(identities)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityQuery {
    #[serde(default)]
    external_id: String,

    #[serde(default)]
    external_id_type: String,

    #[serde(default)]
    name: String,
}

/// GET /identities?externalId=&externalIdType= or ?name=
async fn search_identities_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IdentityQuery>,
) -> HandlerResult {
    let access_token = required_bearer_token(&headers)?;

    let internal = |e: AuthBridgeError| {
        AppError::from(e)
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            .with_message("Internal Server Error")
    };

    if !query.external_id.is_empty() && !query.external_id_type.is_empty() {
        let identity = state
            .manager
            .get_identity(&query.external_id, &query.external_id_type, &access_token)
            .await
            .map_err(internal)?;
        Ok(write_http_json(identity))
    } else if !query.name.is_empty() {
        let identities = state
            .manager
            .search_identities(&query.name, true, &access_token)
            .await
            .map_err(internal)?;
        Ok(write_http_json(IdentityCollection::new(identities)))
    } else {
        Err(AppError::from(AuthBridgeError::invalid_request(
            "externalId and externalIdType, or name, is required",
        )))
    }
}

// ============================================================================
// CONFIG HANDLERS
// ============================================================================

/// POST /authconfig
async fn update_config_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<AuthConfig>, JsonRejection>,
) -> HandlerResult {
    let Json(config) = body.map_err(|e| {
        AppError::from(AuthBridgeError::invalid_request(e.body_text()))
            .with_message("Bad Request, Please check the request content")
    })?;

    state.manager.update_config(config).await.map_err(|e| {
        let status = match e {
            AuthBridgeError::InvalidRequest(_)
            | AuthBridgeError::InvalidConfig(_)
            | AuthBridgeError::UnknownProvider(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error = AppError::from(e).with_status(status);
        if status.is_server_error() {
            error.with_message("Failed to save the auth config")
        } else {
            error
        }
    })?;

    Ok(StatusCode::OK.into_response())
}

/// GET /authconfig
async fn get_config_handler(State(state): State<AppState>, headers: HeaderMap) -> HandlerResult {
    let access_token = bearer_token(&headers)
        .map_err(|e| AppError::from(e).with_message("Unauthorized, please provide a valid token"))?
        .unwrap_or_default();

    let config = state.manager.get_config(&access_token).await.map_err(|e| {
        AppError::from(e)
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            .with_message("Failed to get the auth config")
    })?;

    Ok(write_http_json(config))
}

/// POST /reloadconfig
async fn reload_handler(State(state): State<AppState>) -> HandlerResult {
    state.manager.reload().await.map_err(|e| {
        AppError::from(e)
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            .with_message("Failed to reload the auth config")
    })?;

    Ok(StatusCode::OK.into_response())
}

// ============================================================================
// SYSTEM HANDLERS
// ============================================================================

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics_handler() -> std::result::Result<(StatusCode, String), AppError> {
    let metrics = crate::telemetry::get_metrics()?;
    Ok((StatusCode::OK, metrics))
}
