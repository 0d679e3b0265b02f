//! Shared helpers
//!
//! - `fingerprint`: canonical hashing of parameter sets and payloads
//! - `initials`: avatar initials and default color selection

pub mod fingerprint;
pub mod initials;

pub use fingerprint::{FingerprintBuilder, content_fingerprint};
pub use initials::{avatar_background, initials_from_name};
