//! Avatar initials and default colors

use sha2::{Digest, Sha256};

use crate::models::Rgba;

/// Shown when a name yields no usable characters
pub const UNKNOWN_INITIALS: &str = "?";

/// Background palette for avatars requested without an explicit color
const AVATAR_PALETTE: [Rgba; 16] = [
    Rgba::rgb(0x1a, 0xbc, 0x9c),
    Rgba::rgb(0x2e, 0xcc, 0x71),
    Rgba::rgb(0x34, 0x98, 0xdb),
    Rgba::rgb(0x9b, 0x59, 0xb6),
    Rgba::rgb(0x34, 0x49, 0x5e),
    Rgba::rgb(0x16, 0xa0, 0x85),
    Rgba::rgb(0x27, 0xae, 0x60),
    Rgba::rgb(0x29, 0x80, 0xb9),
    Rgba::rgb(0x8e, 0x44, 0xad),
    Rgba::rgb(0x2c, 0x3e, 0x50),
    Rgba::rgb(0xf3, 0x9c, 0x12),
    Rgba::rgb(0xe6, 0x7e, 0x22),
    Rgba::rgb(0xe7, 0x4c, 0x3c),
    Rgba::rgb(0xd3, 0x54, 0x00),
    Rgba::rgb(0xc0, 0x39, 0x2b),
    Rgba::rgb(0x7f, 0x8c, 0x8d),
];

fn is_word_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '_' | '+' | '.')
}

/// Derive up to two uppercase initials from a display name
///
/// "John Doe" -> "JD", "john-paul jones" -> "JP", "madonna" -> "MA".
pub fn initials_from_name(name: &str) -> String {
    let words: Vec<&str> = name
        .split(is_word_separator)
        .filter(|w| !w.is_empty())
        .collect();

    let picked: String = match words.as_slice() {
        [] => return UNKNOWN_INITIALS.to_string(),
        [single] => single.chars().take(2).collect(),
        [first, second, ..] => first
            .chars()
            .take(1)
            .chain(second.chars().take(1))
            .collect(),
    };

    picked.to_uppercase()
}

/// Pick a stable background color for a name
pub fn avatar_background(name: &str) -> Rgba {
    let digest = Sha256::digest(name.trim().to_lowercase().as_bytes());
    AVATAR_PALETTE[digest[0] as usize % AVATAR_PALETTE.len()]
}
