use serde::{Serialize, Serializer};
use std::fmt;

/// Straight (non-premultiplied) 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `#rrggbb`, the form used in SVG paint attributes
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// `rrggbbaa`, the canonical form used in cache keys
    pub fn canonical(&self) -> String {
        format!("{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 0xff
    }

    pub fn opacity(&self) -> f32 {
        self.a as f32 / 255.0
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting() {
        let color = Rgba::rgb(0x34, 0x98, 0xdb);
        assert_eq!(color.to_hex(), "#3498db");
        assert_eq!(color.canonical(), "3498dbff");
        assert_eq!(color.to_string(), "#3498db");
        assert!(color.is_opaque());
        assert!((color.opacity() - 1.0).abs() < f32::EPSILON);

        let translucent = Rgba::rgba(0, 0, 0, 0x80);
        assert!(!translucent.is_opaque());
        assert_eq!(translucent.canonical(), "00000080");
    }
}
