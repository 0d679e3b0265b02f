//! Avatar and placeholder image handlers

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::errors::{AppResult, RenderError};
use crate::models::render_request::{DEFAULT_BACKGROUND, DEFAULT_FOREGROUND};
use crate::models::{CacheEntry, ImageFormat, RenderRequest, Rgba};
use crate::services::CacheLookup;
use crate::utils::{avatar_background, initials_from_name};
use crate::web::{
    AppState,
    extractors::{ImageDefaults, ImageParams, parse_dimensions, split_format_extension},
    responses::{handle_error, image_response},
};

const AVATAR_FOREGROUND: Rgba = Rgba::rgb(0xff, 0xff, 0xff);

/// `GET /avatar/{name}`; a `.svg`, `.png` or `.webp` suffix selects the format
pub async fn avatar_by_path(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    headers: HeaderMap,
    params: ImageParams,
) -> Response {
    let (name, format) = split_format_extension(&segment);
    let result = avatar_request(&state, name, format, &params);
    respond(&state, result, &headers).await
}

/// `GET /avatar?name=...`
pub async fn avatar_by_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: ImageParams,
) -> Response {
    let name = params.name.clone().unwrap_or_default();
    let result = avatar_request(&state, &name, None, &params);
    respond(&state, result, &headers).await
}

/// `GET /placeholder/{dims}` with `dims` as `WxH` or `N`, optionally suffixed
/// with a format extension
pub async fn placeholder(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    headers: HeaderMap,
    params: ImageParams,
) -> Response {
    let (dims, format) = split_format_extension(&segment);
    let result = parse_dimensions(dims).and_then(|(width, height)| {
        params.to_render_request(
            width,
            height,
            format,
            ImageDefaults {
                text: format!("{width} x {height}"),
                background: DEFAULT_BACKGROUND,
                foreground: DEFAULT_FOREGROUND,
            },
            &state.render_limits,
        )
    });
    respond(&state, result, &headers).await
}

fn avatar_request(
    state: &AppState,
    name: &str,
    format: Option<ImageFormat>,
    params: &ImageParams,
) -> AppResult<RenderRequest> {
    let size = params.avatar_size(state.config.render.default_avatar_size)?;
    params.to_render_request(
        size,
        size,
        format,
        ImageDefaults {
            text: initials_from_name(name),
            background: avatar_background(name),
            foreground: AVATAR_FOREGROUND,
        },
        &state.render_limits,
    )
}

async fn respond(state: &AppState, request: AppResult<RenderRequest>, headers: &HeaderMap) -> Response {
    let result = match request {
        Ok(request) => render_cached(state, request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok((entry, lookup)) => {
            let mut response = image_response(&entry, headers, state.max_age);
            response.extensions_mut().insert(lookup);
            response
        }
        Err(e) => handle_error(e).into_response(),
    }
}

/// Fetch from the render cache, rendering on the blocking pool on a miss
pub async fn render_cached(
    state: &AppState,
    request: RenderRequest,
) -> AppResult<(Arc<CacheEntry>, CacheLookup)> {
    let key = request.cache_key();
    let renderer = Arc::clone(&state.renderer);

    let found = state
        .cache
        .lookup_or_render(&key, move || async move {
            debug!(
                "Rendering {}x{} {}",
                request.width(),
                request.height(),
                request.format()
            );
            tokio::task::spawn_blocking(move || renderer.render(&request))
                .await
                .map_err(|e| RenderError::worker(e.to_string()))?
                .map(CacheEntry::from)
        })
        .await?;

    Ok(found)
}
