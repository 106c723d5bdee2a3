//! Positioned glyph runs and the style hints derived from their transforms
//!
//! A glyph run carries a 2-D affine matrix `[a, b, c, d, e, f]`:
//! `a`/`d` scale, `b`/`c` skew, `e`/`f` translate. Everything the layout
//! code knows about size, slant and position comes from this matrix.

use serde::{Deserialize, Serialize};

/// Identity placement used for runs without an explicit transform
pub const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Skew magnitude above which a run counts as slanted or rotated
const SKEW_THRESHOLD: f64 = 0.1;

/// Horizontal/vertical scale ratio above which a run counts as bold
const BOLD_SCALE_RATIO: f64 = 1.2;

/// One unit of positioned text from the page decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphRun {
    /// The text content
    pub text: String,
    /// `[scaleX, skewX, skewY, scaleY, translateX, translateY]`
    pub transform: [f64; 6],
}

impl GlyphRun {
    pub fn new(text: impl Into<String>, transform: [f64; 6]) -> Self {
        Self {
            text: text.into(),
            transform,
        }
    }

    /// Horizontal position (translateX)
    pub fn x(&self) -> f64 {
        self.transform[4]
    }

    /// Vertical position (translateY, baseline)
    pub fn y(&self) -> f64 {
        self.transform[5]
    }

    /// Advance width. The decoder does not report glyph widths, so the
    /// horizontal scale stands in for it.
    pub fn width(&self) -> f64 {
        self.transform[0]
    }

    /// Height, taken from the vertical scale
    pub fn height(&self) -> f64 {
        self.transform[3]
    }

    pub fn effects(&self) -> TextEffects {
        TextEffects::from_transform(&self.transform)
    }
}

/// Style and placement hints inferred from a single transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextEffects {
    pub is_italic: bool,
    pub is_rotated: bool,
    pub is_bold: bool,
    pub is_stretched: bool,
    pub is_flipped: bool,
    pub font_size: f64,
    pub rotation_degrees: f64,
    pub x: f64,
    pub y: f64,
}

impl TextEffects {
    pub fn from_transform(transform: &[f64; 6]) -> Self {
        let [scale_x, skew_x, skew_y, scale_y, translate_x, translate_y] = *transform;

        Self {
            is_italic: skew_x.abs() > SKEW_THRESHOLD,
            is_rotated: skew_y.abs() > SKEW_THRESHOLD,
            is_bold: scale_x.abs() > scale_y.abs() * BOLD_SCALE_RATIO,
            is_stretched: scale_x.abs() != scale_y.abs(),
            is_flipped: scale_x < 0.0 || scale_y < 0.0,
            font_size: scale_y.abs(),
            rotation_degrees: skew_y.atan2(scale_y).to_degrees(),
            x: translate_x,
            y: translate_y,
        }
    }
}
