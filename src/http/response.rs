//! HTTP response helpers for standardized API responses
//!
//! Errors are written as `{"error": <reason phrase>, "message": <text>,
//! "code": <status>}` so control plane clients can parse every failure the
//! same way.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// HTTP error response body
#[derive(Debug, Serialize)]
struct HttpErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    code: u16,
}

/// Write a standardized HTTP error response
///
/// # Example
/// ```ignore
/// return write_http_error("Bad Request, Please check the request content", StatusCode::BAD_REQUEST);
/// ```
pub fn write_http_error(message: impl Into<String>, status: StatusCode) -> Response {
    let message = message.into();
    let response = HttpErrorResponse {
        error: status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string(),
        message: if message.is_empty() {
            None
        } else {
            Some(message)
        },
        code: status.as_u16(),
    };

    (status, Json(response)).into_response()
}

/// Write a 200 JSON response, or a 500 if the value cannot be encoded
pub fn write_http_json<T: Serialize>(value: T) -> Response {
    match serde_json::to_value(&value) {
        Ok(json_value) => (StatusCode::OK, Json(json_value)).into_response(),
        Err(err) => {
            tracing::error!("Failed to encode response: {}", err);
            write_http_error(
                "Failed to encode response",
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    }
}
