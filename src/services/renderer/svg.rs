//! SVG document assembly
//!
//! Output is a plain string built in a fixed order so identical requests
//! produce byte-identical documents.

use quick_xml::escape::escape;

use crate::models::{RenderRequest, Rgba};
use crate::services::text_fitter::FittedText;

pub const FONT_FAMILY: &str = "'DejaVu Sans', 'Liberation Sans', Arial, Helvetica, sans-serif";

/// Build the SVG document for `request` with pre-computed text layout
pub fn build_svg(request: &RenderRequest, fitted: &FittedText) -> String {
    let width = request.width();
    let height = request.height();

    let mut svg = String::with_capacity(384 + request.text().len() * 2);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    ));
    svg.push_str(&background_element(
        width,
        height,
        request.background(),
        request.rounded(),
    ));

    if !fitted.is_blank() {
        svg.push_str(&text_group(request, fitted));
    }

    svg.push_str("</svg>");
    svg
}

fn background_element(width: u32, height: u32, color: Rgba, rounded: bool) -> String {
    let mut rect = format!(r#"<rect width="{width}" height="{height}""#);
    if rounded {
        let radius = format_number(width.min(height) as f32 / 2.0);
        rect.push_str(&format!(r#" rx="{radius}" ry="{radius}""#));
    }
    rect.push_str(&paint_attributes(color));
    rect.push_str("/>");
    rect
}

fn text_group(request: &RenderRequest, fitted: &FittedText) -> String {
    let center_x = format_number(request.width() as f32 / 2.0);
    let top = request.height() as f32 / 2.0 - fitted.block_height() / 2.0;

    let mut group = format!(
        r#"<g font-family="{FONT_FAMILY}" font-size="{}""#,
        format_number(fitted.font_size)
    );
    if request.bold() {
        group.push_str(r#" font-weight="bold""#);
    }
    group.push_str(&paint_attributes(request.foreground()));
    group.push_str(r#" text-anchor="middle">"#);

    for (index, line) in fitted.lines.iter().enumerate() {
        let y = top + fitted.line_height * (index as f32 + 0.5);
        group.push_str(&format!(
            r#"<text x="{center_x}" y="{}" dominant-baseline="central">{}</text>"#,
            format_number(y),
            escape(line.as_str())
        ));
    }

    group.push_str("</g>");
    group
}

fn paint_attributes(color: Rgba) -> String {
    if color.is_opaque() {
        format!(r#" fill="{}""#, color.to_hex())
    } else {
        format!(
            r#" fill="{}" fill-opacity="{}""#,
            color.to_hex(),
            format_number(color.opacity())
        )
    }
}

/// Two decimal places at most, trailing zeros removed
pub(crate) fn format_number(value: f32) -> String {
    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}
