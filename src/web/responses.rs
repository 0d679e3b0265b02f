//! HTTP response types and utilities
//!
//! JSON endpoints and errors share one envelope; image endpoints answer with
//! the raw payload plus caching headers.

use axum::{
    Json,
    body::Body,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
    },
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;

use crate::errors::{AppError, AppResult};
use crate::models::CacheEntry;

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Request timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Helper function to convert AppResult to a JSON response
pub fn handle_result<T>(result: AppResult<T>) -> Response
where
    T: Serialize,
{
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))).into_response(),
        Err(error) => handle_error(error).into_response(),
    }
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> impl IntoResponse {
    let (status, message) = match &error {
        AppError::Render(render) if render.is_client_error() => {
            (StatusCode::BAD_REQUEST, render.to_string())
        }
        AppError::Render(render) => {
            error!("Render failed: {}", render);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Image rendering failed".to_string(),
            )
        }
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone()),
        AppError::Configuration { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Configuration error: {message}"),
        ),
        AppError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {message}"),
        ),
    };

    (status, Json(ApiResponse::<()>::error(message)))
}

pub fn not_found(path: &str) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error(format!("No route for '{path}'"))),
    )
}

/// `public, max-age=<seconds>`
pub fn cache_control_value(max_age: Duration) -> HeaderValue {
    HeaderValue::from_str(&format!("public, max-age={}", max_age.as_secs()))
        .unwrap_or_else(|_| HeaderValue::from_static("public"))
}

/// Serve a rendered image, honoring `If-None-Match`
pub fn image_response(entry: &CacheEntry, request_headers: &HeaderMap, max_age: Duration) -> Response {
    let etag = HeaderValue::from_str(&entry.etag()).ok();
    let cache_control = cache_control_value(max_age);

    let not_modified = request_headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| entry.matches_if_none_match(value));

    let mut builder = Response::builder().header(CACHE_CONTROL, cache_control);
    if let Some(etag) = etag {
        builder = builder.header(ETAG, etag);
    }

    let response = if not_modified {
        builder.status(StatusCode::NOT_MODIFIED).body(Body::empty())
    } else {
        builder
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, entry.content_type())
            .header(CONTENT_LENGTH, entry.size_bytes())
            .body(Body::from(entry.payload()))
    };

    response.unwrap_or_else(|e| {
        handle_error(AppError::internal(format!("failed to build response: {e}"))).into_response()
    })
}
