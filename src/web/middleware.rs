//! HTTP middleware
//!
//! Request logging and security headers. Compression lives in
//! [`super::compression`].

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue, Method, Uri,
        header::{
            CONTENT_ENCODING, CONTENT_SECURITY_POLICY, CONTENT_TYPE, REFERRER_POLICY,
            X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::services::CacheLookup;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// SVG documents are opened directly by browsers; forbid scripts and
/// external loads inside them
const SVG_CONTENT_SECURITY_POLICY: &str = "default-src 'none'; style-src 'unsafe-inline'; sandbox";

/// One log line per request
///
/// Besides status and timing it records what was served: the content type,
/// the negotiated `Content-Encoding` and how the render cache produced the
/// image. The generated request id is echoed in `x-request-id`.
pub async fn request_logging_middleware(
    method: Method,
    uri: Uri,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    debug!(%method, path = uri.path(), %request_id, "Request received");

    let mut response = next.run(request).await;
    let elapsed_ms = start.elapsed().as_millis();
    let status = response.status();
    let content_type = header_str(&response, &CONTENT_TYPE).unwrap_or("-");
    let encoding = header_str(&response, &CONTENT_ENCODING).unwrap_or("identity");
    let cache = response
        .extensions()
        .get::<CacheLookup>()
        .map_or("-", CacheLookup::as_str);

    if status.is_client_error() || status.is_server_error() {
        warn!(
            %method,
            uri = %uri,
            status = status.as_u16(),
            %request_id,
            elapsed_ms,
            "Request failed"
        );
    } else {
        info!(
            %method,
            uri = %uri,
            status = status.as_u16(),
            content_type,
            encoding,
            cache,
            %request_id,
            elapsed_ms,
            "Served"
        );
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn header_str<'a>(response: &'a Response, name: &HeaderName) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

/// Security headers middleware
///
/// Adds security-related headers to responses
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let is_svg = header_str(&response, &CONTENT_TYPE)
        .is_some_and(|value| value.starts_with("image/svg+xml"));

    let headers = response.headers_mut();
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    if is_svg {
        headers.insert(
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(SVG_CONTENT_SECURITY_POLICY),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use axum::response::IntoResponse;
    use tower::ServiceExt;
    use tracing_test::traced_test;

    fn app() -> Router {
        Router::new()
            .route(
                "/svg",
                get(|| async { ([(CONTENT_TYPE, "image/svg+xml")], "<svg/>") }),
            )
            .route("/text", get(|| async { "ok" }))
            .route(
                "/cached",
                get(|| async {
                    let mut response = ([(CONTENT_TYPE, "image/png")], "png").into_response();
                    response.extensions_mut().insert(CacheLookup::Coalesced);
                    response
                }),
            )
            .route(
                "/missing",
                get(|| async { (StatusCode::NOT_FOUND, "nope") }),
            )
            .layer(axum::middleware::from_fn(security_headers_middleware))
            .layer(axum::middleware::from_fn(request_logging_middleware))
    }

    async fn call(path: &str) -> Response {
        app()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_security_headers() {
        let response = call("/text").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[X_FRAME_OPTIONS], "DENY");
        assert!(response.headers().get(CONTENT_SECURITY_POLICY).is_none());
    }

    #[tokio::test]
    async fn test_svg_gets_content_security_policy() {
        let response = call("/svg").await;
        assert_eq!(
            response.headers()[CONTENT_SECURITY_POLICY],
            SVG_CONTENT_SECURITY_POLICY
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_request_id_is_returned_and_logged() {
        let response = call("/text").await;
        let request_id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(request_id).is_ok());
        assert!(logs_contain("Served"));
        assert!(logs_contain(request_id));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_log_records_cache_outcome_and_encoding() {
        let response = call("/cached").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(logs_contain("cache=\"coalesced\""));
        assert!(logs_contain("content_type=\"image/png\""));
        assert!(logs_contain("encoding=\"identity\""));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_errors_are_logged_as_failures() {
        let response = call("/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(logs_contain("Request failed"));
        assert!(logs_contain("status=404"));
    }
}
