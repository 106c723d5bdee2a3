//! Row grouping and row text formatting
//!
//! Glyph runs arrive in content-stream order with no line structure. This
//! module clusters them into visual rows and renders each row as a single
//! string whose spacing approximates the horizontal gaps on the page.

use crate::glyph::{GlyphRun, TextEffects};
use serde::{Deserialize, Serialize};

/// Tunable layout heuristics
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Max vertical distance to the previous glyph for the same row
    pub row_tolerance: f64,
    /// Space width as a fraction of the font size
    pub space_width_factor: f64,
    /// Space width multiplier for italic glyphs
    pub italic_space_factor: f64,
    /// Space width multiplier for bold or stretched glyphs
    pub bold_space_factor: f64,
    /// Cap on spaces inserted for a single gap
    pub max_spaces: usize,
    /// Gap (in space widths) that still earns one space
    pub min_space_ratio: f64,
    /// Consecutive spaces that separate two matrix columns
    pub column_split_spaces: usize,
    /// Width assigned to each synthesized matrix column
    pub column_width: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            row_tolerance: 2.0,
            space_width_factor: 0.25,
            italic_space_factor: 1.1,
            bold_space_factor: 1.05,
            max_spaces: 15,
            min_space_ratio: 0.3,
            column_split_spaces: 3,
            column_width: 100.0,
        }
    }
}

/// A cluster of glyph runs judged to lie on one visual line
pub type Row = Vec<GlyphRun>;

/// Coarse style classification of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleTag {
    BoldItalic,
    Bold,
    Italic,
    Rotated,
    Unknown,
}

impl StyleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleTag::BoldItalic => "bold-italic",
            StyleTag::Bold => "bold",
            StyleTag::Italic => "italic",
            StyleTag::Rotated => "rotated",
            StyleTag::Unknown => "unknown",
        }
    }
}

/// A rendered row with aggregate geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedRow {
    pub text: String,
    /// Leftmost glyph position
    pub x: f64,
    /// Mean baseline of the row's glyphs
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Largest glyph font size in the row
    pub font_size: f64,
    /// Style tag, not a real font name
    pub font_name: StyleTag,
    /// Glyphs in left-to-right order
    pub items: Row,
}

impl FormattedRow {
    fn empty() -> Self {
        Self {
            text: String::new(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            font_size: 0.0,
            font_name: StyleTag::Unknown,
            items: Vec::new(),
        }
    }
}

/// Group glyphs into rows in a single pass over the stream.
///
/// Each glyph is compared with the last glyph added to the open row, not with
/// the row's first glyph, so a row may drift slowly across small steps.
/// Every glyph lands in exactly one row and rows keep first-glyph order.
pub fn group_into_rows(glyphs: Vec<GlyphRun>, tolerance: f64) -> Vec<Row> {
    let mut rows: Vec<Row> = Vec::new();
    let mut current: Row = Vec::new();

    for glyph in glyphs {
        let same_row = current
            .last()
            .map_or(true, |last| (glyph.y() - last.y()).abs() < tolerance);

        if !same_row {
            rows.push(std::mem::take(&mut current));
        }
        current.push(glyph);
    }

    if !current.is_empty() {
        rows.push(current);
    }

    rows
}

/// Render each row as text with inferred spacing and a style tag
pub fn format_rows(rows: Vec<Row>, options: &LayoutOptions) -> Vec<FormattedRow> {
    rows.into_iter()
        .map(|row| format_row(row, options))
        .collect()
}

fn format_row(mut row: Row, options: &LayoutOptions) -> FormattedRow {
    if row.is_empty() {
        return FormattedRow::empty();
    }

    // Stream order is not visual order
    row.sort_by(|a, b| a.x().partial_cmp(&b.x()).unwrap_or(std::cmp::Ordering::Equal));

    let effects: Vec<TextEffects> = row.iter().map(GlyphRun::effects).collect();
    let mut text = String::new();

    for (i, glyph) in row.iter().enumerate() {
        let current = &effects[i];

        if i > 0 {
            let previous = &row[i - 1];
            let gap = glyph.x() - (previous.x() + previous.width());
            text.push_str(&gap_spacing(gap, current, options));

            if current.is_rotated && !effects[i - 1].is_rotated {
                text.push_str(" [ROTATED] ");
            }
            if current.is_flipped {
                text.push_str(" [FLIPPED] ");
            }
        }

        text.push_str(&glyph.text);
    }

    let min_x = row.iter().map(GlyphRun::x).fold(f64::INFINITY, f64::min);
    let max_x = row
        .iter()
        .map(|g| g.x() + g.width())
        .fold(f64::NEG_INFINITY, f64::max);
    let avg_y = row.iter().map(GlyphRun::y).sum::<f64>() / row.len() as f64;
    let max_font_size = effects
        .iter()
        .map(|e| e.font_size)
        .fold(f64::NEG_INFINITY, f64::max);
    let max_height = row
        .iter()
        .map(GlyphRun::height)
        .fold(f64::NEG_INFINITY, f64::max);

    FormattedRow {
        text: text.trim().to_string(),
        x: min_x,
        y: avg_y,
        width: max_x - min_x,
        height: max_height,
        font_size: max_font_size,
        font_name: style_tag(&effects),
        items: row,
    }
}

/// Spaces standing in for a horizontal gap before a glyph
fn gap_spacing(gap: f64, effects: &TextEffects, options: &LayoutOptions) -> String {
    let mut space_width = effects.font_size * options.space_width_factor;
    if effects.is_italic {
        space_width *= options.italic_space_factor;
    }
    if effects.is_bold || effects.is_stretched {
        space_width *= options.bold_space_factor;
    }

    // Float-to-int casts saturate: negative and NaN give 0, infinity the cap
    let spaces = (gap / space_width).floor() as usize;

    if spaces > 0 {
        " ".repeat(spaces.min(options.max_spaces))
    } else if gap > space_width * options.min_space_ratio {
        " ".to_string()
    } else {
        String::new()
    }
}

/// Row-level style; bold and italic may come from different glyphs
fn style_tag(effects: &[TextEffects]) -> StyleTag {
    let has_bold = effects.iter().any(|e| e.is_bold);
    let has_italic = effects.iter().any(|e| e.is_italic);
    let has_rotation = effects.iter().any(|e| e.is_rotated);

    match (has_bold, has_italic, has_rotation) {
        (true, true, _) => StyleTag::BoldItalic,
        (true, false, _) => StyleTag::Bold,
        (false, true, _) => StyleTag::Italic,
        (false, false, true) => StyleTag::Rotated,
        _ => StyleTag::Unknown,
    }
}
