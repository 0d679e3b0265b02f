//! Health check HTTP handler

use axum::{extract::State, response::Response};
use serde::Serialize;

use crate::services::CacheStats;
use crate::web::{
    AppState,
    compression::CompressionStats,
    responses::handle_result,
};

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: i64,
    pub font_faces: usize,
    pub cache: CacheStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionStats>,
}

/// Health check endpoint
///
/// Reports version, uptime and render cache counters
pub async fn health_check(State(state): State<AppState>) -> Response {
    let uptime = chrono::Utc::now() - state.start_time;

    handle_result(Ok(HealthStatus {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime.num_seconds(),
        font_faces: state.renderer.font_faces(),
        cache: state.cache.stats(),
        compression: state
            .config
            .compression
            .enabled
            .then(|| state.compression.stats()),
    }))
}
