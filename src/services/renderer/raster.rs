//! Rasterization of generated SVG documents

use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};
use resvg::tiny_skia::{Pixmap, Transform};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use usvg::fontdb::{Database, Source};

use crate::errors::{RenderError, RenderResult};
use crate::models::ImageFormat;

/// Family of the bundled faces; first in the SVG font stack
pub const EMBEDDED_FAMILY: &str = "DejaVu Sans";

static EMBEDDED_FONTS: [&[u8]; 2] = [
    include_bytes!("../../../assets/fonts/DejaVuSans.ttf"),
    include_bytes!("../../../assets/fonts/DejaVuSans-Bold.ttf"),
];

/// Font database for raster output
///
/// Always holds the bundled DejaVu Sans faces, so text is drawn the same way
/// on every host. Host fonts are only added when `system_fonts` is set, and
/// ttf/otf/ttc files from `font_dir` come last.
pub fn build_fontdb(font_dir: Option<&Path>, system_fonts: bool) -> Arc<Database> {
    let mut db = Database::new();
    load_embedded_fonts(&mut db);

    if system_fonts {
        db.load_system_fonts();
    }
    if let Some(dir) = font_dir {
        load_fonts_from_dir(&mut db, dir);
    }

    debug!("Font database ready with {} faces", db.faces().count());
    Arc::new(db)
}

/// Add the bundled faces to `db` unless it already has them
pub fn with_embedded_fonts(db: Arc<Database>) -> Arc<Database> {
    if has_embedded_fonts(&db) {
        return db;
    }
    let mut db = Arc::unwrap_or_clone(db);
    load_embedded_fonts(&mut db);
    Arc::new(db)
}

fn has_embedded_fonts(db: &Database) -> bool {
    db.faces().any(|face| {
        matches!(face.source, Source::Binary(_))
            && face
                .families
                .iter()
                .any(|(family, _)| family == EMBEDDED_FAMILY)
    })
}

fn load_embedded_fonts(db: &mut Database) {
    for data in EMBEDDED_FONTS {
        db.load_font_source(Source::Binary(Arc::new(data)));
    }
    db.set_sans_serif_family(EMBEDDED_FAMILY);
}

fn load_fonts_from_dir(db: &mut Database, dir: &Path) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read font directory {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" && ext != "ttc" {
            continue;
        }
        if let Err(e) = db.load_font_file(&path) {
            warn!("Failed to load font {}: {}", path.display(), e);
        }
    }
}

/// Rasterize `svg` to a `width` x `height` canvas and encode it as `format`
pub fn rasterize(
    svg: &str,
    width: u32,
    height: u32,
    format: ImageFormat,
    fontdb: &Arc<Database>,
) -> RenderResult<Vec<u8>> {
    let options = usvg::Options {
        font_family: EMBEDDED_FAMILY.to_string(),
        fontdb: Arc::clone(fontdb),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(svg, &options)
        .map_err(|e| RenderError::encoding(format.extension(), format!("invalid svg: {e}")))?;

    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        RenderError::encoding(
            format.extension(),
            format!("cannot allocate a {width}x{height} canvas"),
        )
    })?;
    resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha; PNG and WebP expect straight alpha
    let rgba: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let px = px.demultiply();
            [px.red(), px.green(), px.blue(), px.alpha()]
        })
        .collect();
    encode(&rgba, width, height, format)
}

fn encode(rgba: &[u8], width: u32, height: u32, format: ImageFormat) -> RenderResult<Vec<u8>> {
    let mut out = Vec::new();
    let result = match format {
        ImageFormat::Png => {
            PngEncoder::new(&mut out).write_image(rgba, width, height, ExtendedColorType::Rgba8)
        }
        ImageFormat::Webp => WebPEncoder::new_lossless(&mut out).write_image(
            rgba,
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        ImageFormat::Svg => {
            return Err(RenderError::encoding(
                format.extension(),
                "svg is not a raster format",
            ));
        }
    };
    result.map_err(|e| RenderError::encoding(format.extension(), e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fontdb_always_has_embedded_faces() {
        let db = build_fontdb(None, false);
        assert_eq!(db.faces().count(), EMBEDDED_FONTS.len());
        assert!(has_embedded_fonts(&db));
        assert!(
            db.faces()
                .any(|face| face.weight == usvg::fontdb::Weight::BOLD)
        );
    }

    #[test]
    fn test_embedded_faces_are_added_once() {
        let db = with_embedded_fonts(Arc::new(Database::new()));
        assert_eq!(db.faces().count(), EMBEDDED_FONTS.len());

        let again = with_embedded_fonts(Arc::clone(&db));
        assert!(Arc::ptr_eq(&db, &again));
    }

    #[test]
    fn test_semi_transparent_pixels_are_demultiplied() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="2" height="2"><rect width="2" height="2" fill="#ff0000" fill-opacity="0.5"/></svg>"##;
        let db = build_fontdb(None, false);
        let png = rasterize(svg, 2, 2, ImageFormat::Png, &db).unwrap();
        let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .unwrap()
            .to_rgba8();

        let [r, g, b, a] = decoded.get_pixel(0, 0).0;
        assert_eq!((r, g, b), (255, 0, 0));
        assert!((127..=128).contains(&a));
    }

    #[test]
    fn test_invalid_svg_is_an_encoding_error() {
        let db = Arc::new(Database::new());
        let err = rasterize("<not-svg", 10, 10, ImageFormat::Png, &db).unwrap_err();
        assert!(matches!(err, RenderError::Encoding { .. }));
    }

    #[test]
    fn test_svg_is_not_encodable() {
        let err = encode(&[0, 0, 0, 0], 1, 1, ImageFormat::Svg).unwrap_err();
        assert!(matches!(err, RenderError::Encoding { .. }));
    }

    #[test]
    fn test_missing_font_dir_is_tolerated() {
        let mut db = Database::new();
        load_fonts_from_dir(&mut db, Path::new("/definitely/not/a/font/dir"));
        assert_eq!(db.faces().count(), 0);
    }
}
