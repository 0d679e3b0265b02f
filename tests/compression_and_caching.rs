//! End-to-end compression and render coalescing through the full router

mod common;

use axum::http::{
    HeaderValue, StatusCode,
    header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, VARY},
};
use flate2::read::GzDecoder;
use std::future::IntoFuture;
use std::io::Read;

use common::test_server;
use grout::config::Config;

fn gunzip(data: &[u8]) -> String {
    let mut out = String::new();
    GzDecoder::new(data).read_to_string(&mut out).unwrap();
    out
}

fn varies_on_encoding(response: &axum_test::TestResponse) -> bool {
    response
        .headers()
        .get_all(VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|name| name.trim().eq_ignore_ascii_case("accept-encoding"))
}

fn unbrotli(data: &[u8]) -> String {
    let mut out = String::new();
    brotli::Decompressor::new(data, 4096)
        .read_to_string(&mut out)
        .unwrap();
    out
}

#[tokio::test]
async fn test_svg_is_gzipped_when_requested() {
    let (server, _state) = test_server(Config::default());

    let plain = server.get("/placeholder/400x300").await;
    let compressed = server
        .get("/placeholder/400x300")
        .add_header(ACCEPT_ENCODING, HeaderValue::from_static("gzip"))
        .await;

    assert_eq!(compressed.status_code(), StatusCode::OK);
    assert_eq!(compressed.headers()[CONTENT_ENCODING], "gzip");
    assert!(varies_on_encoding(&compressed));
    assert_eq!(compressed.headers()[CONTENT_TYPE], "image/svg+xml");
    assert!(compressed.headers().get(CONTENT_LENGTH).is_none());

    let decoded = gunzip(compressed.as_bytes());
    assert_eq!(decoded.as_bytes(), plain.as_bytes().as_ref());
}

#[tokio::test]
async fn test_brotli_preferred_over_gzip() {
    let (server, _state) = test_server(Config::default());

    let response = server
        .get("/avatar/John%20Doe")
        .add_header(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"))
        .await;
    assert_eq!(response.headers()[CONTENT_ENCODING], "br");
    assert!(unbrotli(response.as_bytes()).contains(">JD</text>"));
}

#[tokio::test]
async fn test_repetitive_svg_shrinks() {
    let (server, _state) = test_server(Config::default());
    let long_text = "lorem ipsum dolor sit amet ".repeat(2);

    let plain = server
        .get("/placeholder/2000x2000")
        .add_query_param("text", &long_text)
        .await;
    let compressed = server
        .get("/placeholder/2000x2000")
        .add_query_param("text", &long_text)
        .add_header(ACCEPT_ENCODING, HeaderValue::from_static("gzip"))
        .await;

    assert!(compressed.as_bytes().len() < plain.as_bytes().len());
    assert_eq!(gunzip(compressed.as_bytes()).as_bytes(), plain.as_bytes().as_ref());
}

#[tokio::test]
async fn test_raster_formats_are_not_compressed() {
    let (server, _state) = test_server(Config::default());

    let response = server
        .get("/avatar/JD.webp")
        .add_header(ACCEPT_ENCODING, HeaderValue::from_static("br, gzip"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.headers().get(CONTENT_ENCODING).is_none());
    assert!(!varies_on_encoding(&response));
    assert_eq!(&response.as_bytes()[..4], b"RIFF");
}

#[tokio::test]
async fn test_json_errors_are_compressed_too() {
    let (server, _state) = test_server(Config::default());

    let response = server
        .get("/placeholder/nope")
        .add_header(ACCEPT_ENCODING, HeaderValue::from_static("gzip"))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
    assert!(gunzip(response.as_bytes()).contains("\"success\":false"));
}

#[tokio::test]
async fn test_refused_codings_are_not_used() {
    let (server, _state) = test_server(Config::default());

    let response = server
        .get("/avatar/JD")
        .add_header(ACCEPT_ENCODING, HeaderValue::from_static("br;q=0, gzip;q=0"))
        .await;
    assert!(response.headers().get(CONTENT_ENCODING).is_none());
    assert!(String::from_utf8_lossy(response.as_bytes()).starts_with("<svg"));
}

#[tokio::test]
async fn test_compression_can_be_disabled() {
    let mut config = Config::default();
    config.compression.enabled = false;
    let (server, _state) = test_server(config);

    let response = server
        .get("/avatar/JD")
        .add_header(ACCEPT_ENCODING, HeaderValue::from_static("gzip"))
        .await;
    assert!(response.headers().get(CONTENT_ENCODING).is_none());
    assert!(!varies_on_encoding(&response));
}

#[tokio::test]
async fn test_encoders_are_pooled_across_requests() {
    let (server, state) = test_server(Config::default());

    for _ in 0..3 {
        let response = server
            .get("/avatar/JD")
            .add_header(ACCEPT_ENCODING, HeaderValue::from_static("gzip"))
            .await;
        assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
    }

    let stats = state.compression.stats();
    assert_eq!(stats.gzip.created, 1);
    assert_eq!(stats.gzip.reused, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_requests_render_once() {
    let (server, state) = test_server(Config::default());
    let request = || {
        server
            .get("/placeholder/128x128")
            .add_query_param("text", "AB")
            .add_query_param("bg", "cccccc")
            .add_query_param("fg", "666666")
            .into_future()
    };

    let (first, second) = tokio::join!(request(), request());

    assert_eq!(first.status_code(), StatusCode::OK);
    assert_eq!(second.status_code(), StatusCode::OK);
    assert_eq!(first.as_bytes(), second.as_bytes());

    let svg = String::from_utf8(first.as_bytes().to_vec()).unwrap();
    assert!(svg.contains(r##"<rect width="128" height="128" fill="#cccccc"/>"##));
    assert!(svg.contains(r##"fill="#666666""##));
    assert!(svg.contains(r#"<text x="64" y="64" dominant-baseline="central">AB</text>"#));

    let stats = state.cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits + stats.coalesced, 1);
    assert_eq!(stats.entries, 1);
}
