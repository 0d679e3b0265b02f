//! Core value types shared by the renderer, the cache and the web layer

pub mod cache_entry;
pub mod color;
pub mod render_request;

pub use cache_entry::{CacheEntry, CacheKey};
pub use color::Rgba;
pub use render_request::{ImageFormat, RenderLimits, RenderRequest, RenderRequestBuilder};
