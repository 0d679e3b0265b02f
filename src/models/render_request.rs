//! Canonical, validated render parameters

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::cache_entry::CacheKey;
use super::color::Rgba;
use crate::config::defaults::{DEFAULT_MAX_HEIGHT, DEFAULT_MAX_TEXT_LENGTH, DEFAULT_MAX_WIDTH};
use crate::errors::{RenderError, RenderResult};
use crate::utils::FingerprintBuilder;

/// Bumped whenever rendering output changes for identical parameters
const CACHE_KEY_NAMESPACE: &str = "grout.render.v1";

pub const DEFAULT_BACKGROUND: Rgba = Rgba::rgb(0xcc, 0xcc, 0xcc);
pub const DEFAULT_FOREGROUND: Rgba = Rgba::rgb(0x66, 0x66, 0x66);

/// Output formats the renderer can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Svg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    pub fn is_raster(&self) -> bool {
        !matches!(self, Self::Svg)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            other => Err(format!("unsupported image format '{other}'")),
        }
    }
}

/// Configured bounds every request must respect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLimits {
    pub max_width: u32,
    pub max_height: u32,
    pub max_text_length: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
        }
    }
}

impl RenderLimits {
    /// Reject empty canvases and canvases beyond the configured maximum
    pub fn check_dimensions(&self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        if width > self.max_width || height > self.max_height {
            return Err(RenderError::CapacityExceeded {
                width,
                height,
                max_width: self.max_width,
                max_height: self.max_height,
            });
        }
        Ok(())
    }
}

/// A fully specified, immutable render request
///
/// Built through [`RenderRequest::builder`]; the order of builder calls has no
/// influence on the resulting value or its cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RenderRequest {
    width: u32,
    height: u32,
    text: String,
    background: Rgba,
    foreground: Rgba,
    format: ImageFormat,
    rounded: bool,
    bold: bool,
}

impl RenderRequest {
    pub fn builder(width: u32, height: u32) -> RenderRequestBuilder {
        RenderRequestBuilder {
            width,
            height,
            text: String::new(),
            background: DEFAULT_BACKGROUND,
            foreground: DEFAULT_FOREGROUND,
            format: ImageFormat::Svg,
            rounded: false,
            bold: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn background(&self) -> Rgba {
        self.background
    }

    pub fn foreground(&self) -> Rgba {
        self.foreground
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn rounded(&self) -> bool {
        self.rounded
    }

    pub fn bold(&self) -> bool {
        self.bold
    }

    /// Canonical fingerprint of every field, in a fixed order
    pub fn cache_key(&self) -> CacheKey {
        let fingerprint = FingerprintBuilder::new(CACHE_KEY_NAMESPACE)
            .field("width", self.width.to_string())
            .field("height", self.height.to_string())
            .field("format", self.format.extension())
            .field("background", self.background.canonical())
            .field("foreground", self.foreground.canonical())
            .field("rounded", if self.rounded { "1" } else { "0" })
            .field("bold", if self.bold { "1" } else { "0" })
            .field("text", &self.text)
            .finish();
        CacheKey::new(fingerprint)
    }
}

/// Builder for [`RenderRequest`]
#[derive(Debug, Clone)]
pub struct RenderRequestBuilder {
    width: u32,
    height: u32,
    text: String,
    background: Rgba,
    foreground: Rgba,
    format: ImageFormat,
    rounded: bool,
    bold: bool,
}

impl RenderRequestBuilder {
    pub fn text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    pub fn background(mut self, color: Rgba) -> Self {
        self.background = color;
        self
    }

    pub fn foreground(mut self, color: Rgba) -> Self {
        self.foreground = color;
        self
    }

    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn rounded(mut self, rounded: bool) -> Self {
        self.rounded = rounded;
        self
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    /// Validate dimensions and normalize the text
    ///
    /// Text is trimmed and truncated to `limits.max_text_length` characters;
    /// that is a normalization, not an error.
    pub fn build(self, limits: &RenderLimits) -> RenderResult<RenderRequest> {
        limits.check_dimensions(self.width, self.height)?;

        let text: String = self
            .text
            .trim()
            .chars()
            .take(limits.max_text_length)
            .collect();

        Ok(RenderRequest {
            width: self.width,
            height: self.height,
            text: text.trim_end().to_string(),
            background: self.background,
            foreground: self.foreground,
            format: self.format,
            rounded: self.rounded,
            bold: self.bold,
        })
    }
}
