//! HTTP request handlers
//!
//! Handlers stay thin: they turn path and query input into a
//! [`RenderRequest`](crate::models::RenderRequest) and hand it to the render
//! cache.

pub mod health;
pub mod images;

use axum::{
    http::Uri,
    response::{IntoResponse, Response},
};

use super::responses;

/// JSON 404 for unknown routes
pub async fn fallback(uri: Uri) -> Response {
    responses::not_found(uri.path()).into_response()
}
