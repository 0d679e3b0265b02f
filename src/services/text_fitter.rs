//! Text layout estimation
//!
//! The fitter does not query glyph metrics. Every character is assumed to be
//! `char_width_ratio * font_size` wide, which is close enough for centered
//! initials and short placeholder captions and keeps layout a pure function of
//! its inputs.

use serde::{Deserialize, Serialize};

/// Text up to this many characters is treated as initials
const SHORT_TEXT_MAX_CHARS: usize = 2;
/// Factor applied to the font size on each shrink step
const SHRINK_STEP: f32 = 0.9;
const MAX_SHRINK_STEPS: usize = 64;

/// Tunable layout constants
///
/// The defaults are empirical; they were chosen to look right with common
/// sans-serif fonts, not derived from any font's metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitCalibration {
    /// Estimated advance of one character as a fraction of the font size
    pub char_width_ratio: f32,
    /// Distance between baselines as a multiple of the font size
    pub line_height_ratio: f32,
    /// Font size relative to the shorter canvas edge for 1-2 characters
    pub short_text_scale: f32,
    /// Font size relative to the shorter canvas edge for longer text
    pub long_text_scale: f32,
    /// Padding on each side as a fraction of the canvas edge
    pub padding_ratio: f32,
    /// Lower bound for the font size
    pub min_font_size: f32,
}

impl Default for FitCalibration {
    fn default() -> Self {
        Self {
            char_width_ratio: 0.6,
            line_height_ratio: 1.2,
            short_text_scale: 0.5,
            long_text_scale: 0.25,
            padding_ratio: 0.1,
            min_font_size: 6.0,
        }
    }
}

impl FitCalibration {
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("char_width_ratio", self.char_width_ratio),
            ("line_height_ratio", self.line_height_ratio),
            ("short_text_scale", self.short_text_scale),
            ("long_text_scale", self.long_text_scale),
            ("min_font_size", self.min_font_size),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("render.calibration.{name} must be a positive number"));
            }
        }
        if !self.padding_ratio.is_finite() || !(0.0..0.5).contains(&self.padding_ratio) {
            return Err("render.calibration.padding_ratio must be within [0, 0.5)".to_string());
        }
        Ok(())
    }
}

/// Result of fitting text into a canvas
#[derive(Debug, Clone, PartialEq)]
pub struct FittedText {
    pub font_size: f32,
    pub line_height: f32,
    /// Never empty; blank input yields a single empty line
    pub lines: Vec<String>,
}

impl FittedText {
    pub fn block_height(&self) -> f32 {
        self.line_height * self.lines.len() as f32
    }

    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|line| line.is_empty())
    }
}

/// Computes font size and line breaks for a canvas
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFitter {
    calibration: FitCalibration,
}

impl TextFitter {
    pub fn new(calibration: FitCalibration) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> &FitCalibration {
        &self.calibration
    }

    /// Estimated rendered width of `text` at `font_size`
    pub fn estimate_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * self.calibration.char_width_ratio
    }

    /// Width available for text once padding is removed
    pub fn usable_width(&self, canvas_width: u32) -> f32 {
        (canvas_width as f32 * (1.0 - 2.0 * self.calibration.padding_ratio)).max(1.0)
    }

    pub fn usable_height(&self, canvas_height: u32) -> f32 {
        (canvas_height as f32 * (1.0 - 2.0 * self.calibration.padding_ratio)).max(1.0)
    }

    /// Fit `text` into a `canvas_width` x `canvas_height` canvas
    pub fn fit(&self, text: &str, canvas_width: u32, canvas_height: u32) -> FittedText {
        let cal = &self.calibration;
        let base = canvas_width.min(canvas_height) as f32;
        let usable_width = self.usable_width(canvas_width);
        let usable_height = self.usable_height(canvas_height);

        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            return self.fitted(base * cal.long_text_scale, vec![String::new()]);
        }

        let char_count = normalized.chars().count();
        if char_count <= SHORT_TEXT_MAX_CHARS {
            let mut size = base * cal.short_text_scale;
            if self.estimate_width(&normalized, size) > usable_width {
                size = usable_width / (char_count as f32 * cal.char_width_ratio);
            }
            if size * cal.line_height_ratio > usable_height {
                size = usable_height / cal.line_height_ratio;
            }
            return self.fitted(size, vec![normalized]);
        }

        let mut size = self.clamp_size(base * cal.long_text_scale);
        for _ in 0..MAX_SHRINK_STEPS {
            let lines = self.wrap(&normalized, size, usable_width);
            let block_height = lines.len() as f32 * size * cal.line_height_ratio;
            if block_height <= usable_height || size <= cal.min_font_size {
                return self.fitted(size, lines);
            }
            size = self.clamp_size(size * SHRINK_STEP);
        }

        let lines = self.wrap(&normalized, size, usable_width);
        self.fitted(size, lines)
    }

    /// Greedy word wrap to the number of characters that fit `usable_width`
    ///
    /// Words longer than a line are cut into fixed-width chunks.
    fn wrap(&self, text: &str, font_size: f32, usable_width: f32) -> Vec<String> {
        let max_chars =
            ((usable_width / (font_size * self.calibration.char_width_ratio)).floor() as usize).max(1);

        if text.chars().count() <= max_chars {
            return vec![text.to_string()];
        }

        let mut lines = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in text.split(' ') {
            let word_len = word.chars().count();

            if word_len > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let chars: Vec<char> = word.chars().collect();
                current_len = 0;
                for chunk in chars.chunks(max_chars) {
                    let piece: String = chunk.iter().collect();
                    if chunk.len() == max_chars {
                        lines.push(piece);
                    } else {
                        current = piece;
                        current_len = chunk.len();
                    }
                }
                continue;
            }

            let needed = if current.is_empty() {
                word_len
            } else {
                current_len + 1 + word_len
            };

            if needed <= max_chars {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                current_len = needed;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
                current_len = word_len;
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    /// Floor to 0.01 so the reported size never exceeds the size used for layout
    fn clamp_size(&self, size: f32) -> f32 {
        ((size * 100.0).floor() / 100.0).max(self.calibration.min_font_size)
    }

    fn fitted(&self, size: f32, lines: Vec<String>) -> FittedText {
        let font_size = self.clamp_size(size);
        FittedText {
            font_size,
            line_height: font_size * self.calibration.line_height_ratio,
            lines,
        }
    }
}
