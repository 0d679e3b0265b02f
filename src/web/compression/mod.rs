//! Response compression
//!
//! Text-like responses (SVG, HTML, JSON and friends) are compressed with
//! brotli or gzip according to the request's `Accept-Encoding`. Raster image
//! formats are already compressed and pass through untouched.
//!
//! Bodies are compressed as they stream; the original `Content-Length` is
//! dropped because the encoded length is not known up front.

pub mod encoders;
pub mod pool;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        HeaderValue, StatusCode,
        header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, VARY},
    },
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io;
use tracing::{debug, error};

pub use encoders::{ContentCoding, EncoderSettings, StreamEncoder};
pub use pool::{CompressionPools, CompressionStats, EncoderPool, PoolStats, PooledEncoder};

/// Media types worth compressing
pub const COMPRESSIBLE_TYPES: &[&str] = &[
    "image/svg+xml",
    "text/html",
    "text/plain",
    "text/css",
    "text/javascript",
    "text/xml",
    "application/javascript",
    "application/json",
    "application/xml",
];

/// Whether a response with this `Content-Type` should be compressed
///
/// Only the media type is compared; parameters such as `charset` are ignored.
pub fn should_compress(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    COMPRESSIBLE_TYPES.contains(&essence.as_str())
}

/// Pick a content coding from an `Accept-Encoding` value
///
/// brotli wins over gzip whenever both are acceptable. A coding listed with
/// `q=0` is refused even if `*` would otherwise allow it.
pub fn negotiate(accept_encoding: &str) -> Option<ContentCoding> {
    let mut brotli = None;
    let mut gzip = None;
    let mut wildcard = None;

    for entry in accept_encoding.split(',') {
        let mut parts = entry.split(';');
        let token = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        if token.is_empty() {
            continue;
        }
        let quality = parts
            .filter_map(|param| {
                let (name, value) = param.split_once('=')?;
                if name.trim().eq_ignore_ascii_case("q") {
                    value.trim().parse::<f32>().ok()
                } else {
                    None
                }
            })
            .next()
            .unwrap_or(1.0);

        match token.as_str() {
            "br" => brotli = Some(quality),
            "gzip" | "x-gzip" => gzip = Some(quality),
            "*" => wildcard = Some(quality),
            _ => {}
        }
    }

    let acceptable = |explicit: Option<f32>| explicit.or(wildcard).is_some_and(|q| q > 0.0);

    if acceptable(brotli) {
        Some(ContentCoding::Brotli)
    } else if acceptable(gzip) {
        Some(ContentCoding::Gzip)
    } else {
        None
    }
}

/// Compression middleware
///
/// Layered with `from_fn_with_state` and the shared [`CompressionPools`].
pub async fn compression_middleware(
    State(pools): State<CompressionPools>,
    request: Request,
    next: Next,
) -> Response {
    let accept_encoding = request
        .headers()
        .get(ACCEPT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let response = next.run(request).await;
    compress_response(response, accept_encoding.as_deref(), &pools)
}

/// Apply compression to a finished response
pub fn compress_response(
    mut response: Response,
    accept_encoding: Option<&str>,
    pools: &CompressionPools,
) -> Response {
    let status = response.status();
    if status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return response;
    }
    if response.headers().contains_key(CONTENT_ENCODING) {
        return response;
    }

    let compressible = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(should_compress);
    if !compressible {
        return response;
    }

    add_vary_accept_encoding(&mut response);

    let Some(coding) = accept_encoding.and_then(negotiate) else {
        return response;
    };

    debug!("Compressing response with {}", coding);
    let (mut parts, body) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_ENCODING, HeaderValue::from_static(coding.as_str()));

    let encoder = pools.pool(coding).checkout();
    Response::from_parts(parts, Body::from_stream(encode_body(body, encoder)))
}

fn add_vary_accept_encoding(response: &mut Response) {
    let already_varies = response
        .headers()
        .get_all(VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| {
            let token = token.trim();
            token == "*" || token.eq_ignore_ascii_case("accept-encoding")
        });
    if !already_varies {
        response
            .headers_mut()
            .append(VARY, HeaderValue::from_static("Accept-Encoding"));
    }
}

/// Stream `body` through `encoder`
///
/// An error part way through surfaces as a body error, which aborts the
/// connection rather than ending the response cleanly.
fn encode_body(
    body: Body,
    mut encoder: PooledEncoder,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    async_stream::try_stream! {
        let mut data = body.into_data_stream();

        while let Some(chunk) = data.next().await {
            let chunk = chunk.map_err(|e| {
                error!("Response body failed during compression: {}", e);
                io::Error::other(e)
            })?;
            let encoded = encoder.encode_chunk(&chunk).map_err(|e| {
                error!("{} encoder failed: {}", encoder.coding(), e);
                e
            })?;
            if !encoded.is_empty() {
                yield encoded;
            }
        }

        let tail = encoder.finish().map_err(|e| {
            error!("{} encoder failed to finish: {}", encoder.coding(), e);
            e
        })?;
        if !tail.is_empty() {
            yield tail;
        }
    }
}
