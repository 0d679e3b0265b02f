//! Image rendering engine
//!
//! Every render starts from the same SVG document. Raster formats rasterize
//! that document with resvg, so SVG, PNG and WebP output of one request share
//! layout and colors exactly.
//!
//! Rendering is CPU bound and synchronous; async callers should run it on the
//! blocking pool.

pub mod raster;
pub mod svg;

use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use usvg::fontdb::Database;

use crate::config::RenderConfig;
use crate::errors::{RenderError, RenderResult};
use crate::models::{CacheEntry, ImageFormat, RenderLimits, RenderRequest};
use crate::services::text_fitter::TextFitter;

pub use raster::{EMBEDDED_FAMILY, build_fontdb, with_embedded_fonts};
pub use svg::build_svg;

/// Hard ceiling on either canvas edge, independent of configuration
pub const MAX_CANVAS_EDGE: u32 = 16_384;
/// Hard ceiling on canvas area in pixels
pub const MAX_CANVAS_PIXELS: u64 = 64 * 1024 * 1024;

/// Encoded output of a single render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub payload: Bytes,
    pub content_type: &'static str,
}

impl From<RenderedImage> for CacheEntry {
    fn from(image: RenderedImage) -> Self {
        CacheEntry::new(image.payload, image.content_type)
    }
}

pub struct Renderer {
    fitter: TextFitter,
    limits: RenderLimits,
    fontdb: Arc<Database>,
}

impl Renderer {
    /// Create a renderer with the bundled fonts plus whatever `config` adds
    pub fn new(config: &RenderConfig) -> Self {
        let fontdb = build_fontdb(config.font_dir.as_deref(), config.system_fonts);
        Self::with_fontdb(config, fontdb)
    }

    /// Create a renderer around an existing font database; the bundled
    /// faces are added if it lacks them
    pub fn with_fontdb(config: &RenderConfig, fontdb: Arc<Database>) -> Self {
        Self {
            fitter: TextFitter::new(config.calibration),
            limits: config.limits(),
            fontdb: with_embedded_fonts(fontdb),
        }
    }

    pub fn limits(&self) -> &RenderLimits {
        &self.limits
    }

    pub fn fitter(&self) -> &TextFitter {
        &self.fitter
    }

    pub fn font_faces(&self) -> usize {
        self.fontdb.faces().count()
    }

    /// Produce the SVG document for `request`
    pub fn render_svg(&self, request: &RenderRequest) -> RenderResult<String> {
        self.check_capacity(request.width(), request.height())?;
        let fitted = self
            .fitter
            .fit(request.text(), request.width(), request.height());
        Ok(build_svg(request, &fitted))
    }

    /// Render `request` in its requested format
    pub fn render(&self, request: &RenderRequest) -> RenderResult<RenderedImage> {
        let started = Instant::now();
        let svg = self.render_svg(request)?;

        let payload = match request.format() {
            ImageFormat::Svg => Bytes::from(svg),
            format => Bytes::from(raster::rasterize(
                &svg,
                request.width(),
                request.height(),
                format,
                &self.fontdb,
            )?),
        };

        debug!(
            "Rendered {}x{} {} ({} bytes) in {:?}",
            request.width(),
            request.height(),
            request.format(),
            payload.len(),
            started.elapsed()
        );

        Ok(RenderedImage {
            payload,
            content_type: request.format().content_type(),
        })
    }

    /// Reject canvases beyond the configured limits or the hard ceiling
    pub fn check_capacity(&self, width: u32, height: u32) -> RenderResult<()> {
        self.limits.check_dimensions(width, height)?;

        if width > MAX_CANVAS_EDGE || height > MAX_CANVAS_EDGE {
            return Err(RenderError::CapacityExceeded {
                width,
                height,
                max_width: MAX_CANVAS_EDGE,
                max_height: MAX_CANVAS_EDGE,
            });
        }
        if width as u64 * height as u64 > MAX_CANVAS_PIXELS {
            return Err(RenderError::CapacityExceeded {
                width,
                height,
                max_width: (MAX_CANVAS_PIXELS / height as u64).min(MAX_CANVAS_EDGE as u64) as u32,
                max_height: height,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rgba;

    /// Host fonts left out so output only depends on the bundled faces
    fn renderer() -> Renderer {
        Renderer::with_fontdb(&RenderConfig::default(), Arc::new(Database::new()))
    }

    fn request(format: ImageFormat) -> RenderRequest {
        RenderRequest::builder(128, 128)
            .text("AB")
            .format(format)
            .build(&RenderLimits::default())
            .unwrap()
    }

    fn decode(payload: &[u8], format: image::ImageFormat) -> image::RgbaImage {
        image::load_from_memory_with_format(payload, format)
            .unwrap()
            .to_rgba8()
    }

    #[test]
    fn test_svg_output_is_deterministic() {
        let renderer = renderer();
        let first = renderer.render(&request(ImageFormat::Svg)).unwrap();
        let second = renderer.render(&request(ImageFormat::Svg)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.content_type, "image/svg+xml");
        assert!(std::str::from_utf8(&first.payload).unwrap().contains(">AB</text>"));
    }

    #[test]
    fn test_png_output() {
        let renderer = renderer();
        let image = renderer.render(&request(ImageFormat::Png)).unwrap();
        assert_eq!(image.content_type, "image/png");
        assert_eq!(&image.payload[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = decode(&image.payload, image::ImageFormat::Png);
        assert_eq!(decoded.dimensions(), (128, 128));
        assert_eq!(decoded.get_pixel(0, 0).0, [0xcc, 0xcc, 0xcc, 0xff]);

        let again = renderer.render(&request(ImageFormat::Png)).unwrap();
        assert_eq!(image.payload, again.payload);
    }

    #[test]
    fn test_webp_output() {
        let renderer = renderer();
        let image = renderer.render(&request(ImageFormat::Webp)).unwrap();
        assert_eq!(image.content_type, "image/webp");
        assert_eq!(&image.payload[..4], b"RIFF");
        assert_eq!(&image.payload[8..12], b"WEBP");

        let decoded = decode(&image.payload, image::ImageFormat::WebP);
        assert_eq!(decoded.dimensions(), (128, 128));
        assert_eq!(decoded.get_pixel(5, 5).0, [0xcc, 0xcc, 0xcc, 0xff]);
    }

    fn dark_pixels(image: &image::RgbaImage) -> usize {
        image
            .pixels()
            .filter(|px| px.0[3] == 0xff && px.0[..3].iter().all(|&c| c < 0x40))
            .count()
    }

    fn black_on_white(format: ImageFormat) -> RenderRequest {
        RenderRequest::builder(128, 128)
            .text("AB")
            .background(Rgba::rgb(0xff, 0xff, 0xff))
            .foreground(Rgba::rgb(0, 0, 0))
            .format(format)
            .build(&RenderLimits::default())
            .unwrap()
    }

    #[test]
    fn test_raster_text_drawn_without_host_fonts() {
        let renderer = renderer();
        assert_eq!(renderer.font_faces(), 2);

        let png = renderer.render(&black_on_white(ImageFormat::Png)).unwrap();
        let decoded = decode(&png.payload, image::ImageFormat::Png);
        assert!(dark_pixels(&decoded) > 100);
        assert_eq!(decoded.get_pixel(0, 0).0, [0xff, 0xff, 0xff, 0xff]);

        let webp = renderer.render(&black_on_white(ImageFormat::Webp)).unwrap();
        let decoded = decode(&webp.payload, image::ImageFormat::WebP);
        assert!(dark_pixels(&decoded) > 100);
    }

    #[test]
    fn test_raster_output_matches_across_renderers() {
        let first = renderer().render(&black_on_white(ImageFormat::Png)).unwrap();
        let second = Renderer::new(&RenderConfig::default())
            .render(&black_on_white(ImageFormat::Png))
            .unwrap();
        assert_eq!(first.payload, second.payload);
    }

    #[test]
    fn test_rounded_raster_has_transparent_corners() {
        let request = RenderRequest::builder(64, 64)
            .background(Rgba::rgb(0x34, 0x98, 0xdb))
            .rounded(true)
            .format(ImageFormat::Png)
            .build(&RenderLimits::default())
            .unwrap();
        let image = renderer().render(&request).unwrap();
        let decoded = decode(&image.payload, image::ImageFormat::Png);

        assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
        assert_eq!(decoded.get_pixel(32, 32).0, [0x34, 0x98, 0xdb, 0xff]);
    }

    #[test]
    fn test_configured_limits_are_enforced() {
        let renderer = renderer();
        let oversized = RenderRequest::builder(5000, 10)
            .build(&RenderLimits {
                max_width: 10_000,
                max_height: 10_000,
                max_text_length: 10,
            })
            .unwrap();
        let err = renderer.render(&oversized).unwrap_err();
        assert!(matches!(
            err,
            RenderError::CapacityExceeded {
                max_width: 4096,
                ..
            }
        ));
    }

    #[test]
    fn test_hard_ceiling_applies_over_configuration() {
        let config = RenderConfig {
            max_width: 100_000,
            max_height: 100_000,
            ..RenderConfig::default()
        };
        let renderer = Renderer::with_fontdb(&config, Arc::new(Database::new()));

        let err = renderer.check_capacity(MAX_CANVAS_EDGE + 1, 1).unwrap_err();
        assert!(matches!(err, RenderError::CapacityExceeded { .. }));

        let err = renderer.check_capacity(10_000, 10_000).unwrap_err();
        assert!(matches!(
            err,
            RenderError::CapacityExceeded {
                max_height: 10_000,
                ..
            }
        ));

        assert!(renderer.check_capacity(8192, 8192).is_ok());
    }
}
