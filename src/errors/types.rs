//! Error type definitions for grout
//!
//! This module defines the error hierarchy used throughout the service.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Rendering core errors
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Request parameter validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised by the rendering core
///
/// Only hard failures live here; nothing in this enum is retried by the core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Requested canvas exceeds a configured limit or the renderer's hard ceiling
    #[error("Canvas {width}x{height} exceeds the maximum of {max_width}x{max_height}")]
    CapacityExceeded {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    /// Zero-sized canvas
    #[error("Invalid canvas dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Canvas allocation or raster encoding failed
    #[error("Failed to encode {format}: {message}")]
    Encoding { format: String, message: String },

    /// The blocking render worker panicked or was cancelled
    #[error("Render worker failed: {message}")]
    Worker { message: String },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl RenderError {
    /// Create an encoding error for the given output format
    pub fn encoding<F: Into<String>, M: Into<String>>(format: F, message: M) -> Self {
        Self::Encoding {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn worker<S: Into<String>>(message: S) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }

    /// Whether the caller asked for something the service refuses to draw,
    /// as opposed to the service failing to draw it
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. } | Self::InvalidDimensions { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_classification() {
        let capacity = RenderError::CapacityExceeded {
            width: 9000,
            height: 10,
            max_width: 4096,
            max_height: 4096,
        };
        assert!(capacity.is_client_error());
        assert!(RenderError::InvalidDimensions { width: 0, height: 5 }.is_client_error());
        assert!(!RenderError::encoding("png", "boom").is_client_error());
        assert!(!RenderError::worker("panicked").is_client_error());
    }

    #[test]
    fn test_render_error_converts_into_app_error() {
        let err: AppError = RenderError::encoding("webp", "out of memory").into();
        assert!(matches!(err, AppError::Render(RenderError::Encoding { .. })));
        assert_eq!(
            err.to_string(),
            "Render error: Failed to encode webp: out of memory"
        );
    }
}
