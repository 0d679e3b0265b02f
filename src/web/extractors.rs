//! Request extractors and validation
//!
//! Query strings and path segments are normalized here into a validated
//! [`RenderRequest`]. Colors and flags never fail; dimensions, sizes and
//! formats do.

use axum::{
    Json,
    extract::{FromRequestParts, Query},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::responses::ApiResponse;
use crate::errors::{AppError, AppResult, RenderError};
use crate::models::{ImageFormat, RenderLimits, RenderRequest, Rgba};
use crate::services::color_parser::parse_color_or;

/// Query parameters shared by the image endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, alias = "bg")]
    pub background: Option<String>,
    #[serde(default, alias = "fg")]
    pub color: Option<String>,
    #[serde(default)]
    pub rounded: Option<String>,
    #[serde(default)]
    pub bold: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

impl<S> FromRequestParts<S> for ImageParams
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params): Query<ImageParams> = Query::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::<()>::error(format!(
                        "Invalid query parameters: {}",
                        e.body_text()
                    ))),
                )
                    .into_response()
            })?;
        Ok(params)
    }
}

/// Defaults that differ between avatars and placeholders
#[derive(Debug, Clone)]
pub struct ImageDefaults {
    pub text: String,
    pub background: Rgba,
    pub foreground: Rgba,
}

impl ImageParams {
    /// Build a validated request for a `width` x `height` canvas
    ///
    /// `path_format` comes from a file extension in the path; an explicit
    /// `format` query parameter takes precedence over it.
    pub fn to_render_request(
        &self,
        width: u32,
        height: u32,
        path_format: Option<ImageFormat>,
        defaults: ImageDefaults,
        limits: &RenderLimits,
    ) -> AppResult<RenderRequest> {
        let format = match self.format.as_deref() {
            Some(raw) => raw.parse::<ImageFormat>().map_err(AppError::validation)?,
            None => path_format.unwrap_or_default(),
        };

        let request = RenderRequest::builder(width, height)
            .text(self.text.clone().unwrap_or(defaults.text))
            .background(parse_color_or(self.background.as_deref(), defaults.background))
            .foreground(parse_color_or(self.color.as_deref(), defaults.foreground))
            .rounded(parse_flag(self.rounded.as_deref()))
            .bold(parse_flag(self.bold.as_deref()))
            .format(format)
            .build(limits)?;
        Ok(request)
    }

    /// `size` as an avatar edge length, falling back to `default_size`
    pub fn avatar_size(&self, default_size: u32) -> AppResult<u32> {
        match self.size.as_deref().map(str::trim) {
            None | Some("") => Ok(default_size),
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| AppError::validation(format!("Invalid size '{raw}'"))),
        }
    }
}

/// `true`, `1`, `yes` and `on` (any case) are true; everything else is false
pub fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        )
    })
}

/// Split a known image extension off a path segment
///
/// `"JD.png"` yields `("JD", Some(Png))`; unknown extensions stay part of the
/// name.
pub fn split_format_extension(segment: &str) -> (&str, Option<ImageFormat>) {
    if let Some((stem, ext)) = segment.rsplit_once('.')
        && let Ok(format) = ext.parse::<ImageFormat>()
    {
        return (stem, Some(format));
    }
    (segment, None)
}

/// Parse placeholder dimensions: `"600x400"`, `"600X400"` or `"300"` (square)
pub fn parse_dimensions(raw: &str) -> AppResult<(u32, u32)> {
    let invalid = || AppError::validation(format!("Invalid dimensions '{raw}'"));
    let parse = |value: &str| value.trim().parse::<u32>().map_err(|_| invalid());

    let (width, height) = match raw.split_once(['x', 'X']) {
        Some((w, h)) => (parse(w)?, parse(h)?),
        None => {
            let size = parse(raw)?;
            (size, size)
        }
    };

    if width == 0 || height == 0 {
        return Err(RenderError::InvalidDimensions { width, height }.into());
    }
    Ok((width, height))
}
