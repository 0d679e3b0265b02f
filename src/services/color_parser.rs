//! Hex color parsing with a best-effort fallback
//!
//! Colors are cosmetic inputs: a malformed value must never fail a render, so
//! [`parse_color`] is total and maps anything it cannot read to
//! [`FALLBACK_COLOR`].

use crate::models::Rgba;

/// Neutral gray used for every unreadable color
pub const FALLBACK_COLOR: Rgba = Rgba::rgb(0x80, 0x80, 0x80);

/// Parse `rrggbb` (case-insensitive, optional `#` or `0x` prefix)
pub fn parse_color(input: &str) -> Rgba {
    try_parse_color(input).unwrap_or(FALLBACK_COLOR)
}

/// Parse an optional query value, using `default` when it is absent
///
/// A present but malformed value still maps to [`FALLBACK_COLOR`].
pub fn parse_color_or(input: Option<&str>, default: Rgba) -> Rgba {
    match input {
        Some(value) if !value.trim().is_empty() => parse_color(value),
        _ => default,
    }
}

/// Strict variant returning `None` for anything but exactly six hex digits
pub fn try_parse_color(input: &str) -> Option<Rgba> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some(Rgba::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("zzzzzz")]
    #[case("")]
    #[case("12345")]
    #[case("1234567")]
    #[case("#12345g")]
    #[case("##123456")]
    #[case("fff")]
    #[case("12 456")]
    #[case("+12345")]
    fn test_invalid_input_falls_back(#[case] input: &str) {
        assert_eq!(parse_color(input), FALLBACK_COLOR);
        assert!(try_parse_color(input).is_none());
    }

    #[rstest]
    #[case("3498DB")]
    #[case("3498db")]
    #[case("#3498db")]
    #[case("0x3498Db")]
    #[case(" 3498db ")]
    fn test_valid_input(#[case] input: &str) {
        assert_eq!(parse_color(input), Rgba::rgb(0x34, 0x98, 0xdb));
    }

    #[test]
    fn test_parse_color_or_default() {
        let default = Rgba::rgb(1, 2, 3);
        assert_eq!(parse_color_or(None, default), default);
        assert_eq!(parse_color_or(Some("  "), default), default);
        assert_eq!(parse_color_or(Some("nope"), default), FALLBACK_COLOR);
        assert_eq!(parse_color_or(Some("ffffff"), default), Rgba::rgb(255, 255, 255));
    }

    proptest! {
        #[test]
        fn test_parse_never_panics(input in ".{0,16}") {
            let color = parse_color(&input);
            prop_assert_eq!(color.a, 0xff);
        }

        #[test]
        fn test_hex_round_trip(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
            let color = Rgba::rgb(r, g, b);
            prop_assert_eq!(parse_color(&color.to_hex()), color);
            prop_assert_eq!(parse_color(&color.to_hex().to_uppercase()), color);
        }
    }
}
