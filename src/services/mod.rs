//! Rendering core
//!
//! - [`color_parser`] turns user supplied hex strings into colors
//! - [`text_fitter`] chooses font size and line breaks for a canvas
//! - [`renderer`] produces SVG, PNG and WebP payloads
//! - [`render_cache`] stores payloads and coalesces concurrent renders

pub mod color_parser;
pub mod render_cache;
pub mod renderer;
pub mod text_fitter;

pub use render_cache::{CacheLookup, CacheStats, RenderCache};
pub use renderer::{RenderedImage, Renderer};
pub use text_fitter::{FitCalibration, FittedText, TextFitter};
