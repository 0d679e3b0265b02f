//! Centralized error handling for grout
//!
//! Two layers of errors exist:
//!
//! - **RenderError**: failures of the rendering core (capacity limits, raster
//!   encoding). These are `Clone` so one failed render can be handed to every
//!   request waiting on the same cache key.
//! - **AppError**: everything the web layer can report, including validation
//!   of request parameters and configuration problems.
//!
//! Cosmetic input problems (bad colors, empty text) are never errors; they are
//! normalized to defaults before rendering.
//!
//! # Usage
//!
//! ```rust
//! use grout::errors::{AppError, AppResult};
//!
//! fn parse_size(raw: &str) -> AppResult<u32> {
//!     raw.parse()
//!         .map_err(|_| AppError::validation(format!("invalid size '{raw}'")))
//! }
//! assert!(parse_size("abc").is_err());
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for rendering Results
pub type RenderResult<T> = Result<T, RenderError>;
