//! Table reconstruction from formatted rows
//!
//! Cells are found by splitting each row's text on wide whitespace runs. The
//! column grid is synthesized rather than fitted to glyph positions.

use crate::rows::{FormattedRow, LayoutOptions};
use serde::{Deserialize, Serialize};

/// Horizontal extent assigned to a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnBounds {
    pub x: f64,
    pub width: f64,
}

/// Rectangular string-cell reconstruction of a document's rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matrix {
    /// Every row has exactly `column_count` cells
    pub rows: Vec<Vec<String>>,
    pub column_count: usize,
    pub row_count: usize,
    pub column_bounds: Vec<ColumnBounds>,
}

impl Matrix {
    /// Tab-separated rendering, one line per row
    pub fn to_tsv(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Build a rectangular matrix from formatted rows
pub fn build_matrix(rows: &[FormattedRow], options: &LayoutOptions) -> Matrix {
    let mut cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| split_cells(&row.text, options.column_split_spaces))
        .collect();

    let column_count = cells.iter().map(Vec::len).max().unwrap_or(0).max(1);

    for row in &mut cells {
        row.resize(column_count, String::new());
    }

    let column_bounds = (0..column_count)
        .map(|i| ColumnBounds {
            x: i as f64 * options.column_width,
            width: options.column_width,
        })
        .collect();

    Matrix {
        row_count: cells.len(),
        rows: cells,
        column_count,
        column_bounds,
    }
}

/// Split on runs of at least `min_spaces` spaces, dropping empty cells
fn split_cells(text: &str, min_spaces: usize) -> Vec<String> {
    let separator = " ".repeat(min_spaces.max(1));
    let mut cells = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&separator) {
        cells.push(&rest[..start]);
        rest = rest[start..].trim_start_matches(' ');
    }
    cells.push(rest);

    cells
        .into_iter()
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::StyleTag;

    fn row(text: &str) -> FormattedRow {
        FormattedRow {
            text: text.to_string(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            font_size: 0.0,
            font_name: StyleTag::Unknown,
            items: Vec::new(),
        }
    }

    #[test]
    fn test_split_cells() {
        assert_eq!(split_cells("a   b    c", 3), vec!["a", "b", "c"]);
        // Two spaces stay inside a cell
        assert_eq!(split_cells("Opening  Balance   10.00", 3), vec!["Opening  Balance", "10.00"]);
        assert_eq!(split_cells("   lead   ", 3), vec!["lead"]);
        assert!(split_cells("", 3).is_empty());
    }

    #[test]
    fn test_rows_are_padded() {
        let rows = vec![row("Date   Description   Balance"), row("Total"), row("")];
        let matrix = build_matrix(&rows, &LayoutOptions::default());

        assert_eq!(matrix.column_count, 3);
        assert_eq!(matrix.row_count, 3);
        assert!(matrix.rows.iter().all(|r| r.len() == 3));
        assert_eq!(matrix.rows[1], vec!["Total", "", ""]);
        assert_eq!(matrix.rows[2], vec!["", "", ""]);
    }

    #[test]
    fn test_column_bounds_are_synthesized() {
        let matrix = build_matrix(&[row("a   b")], &LayoutOptions::default());
        assert_eq!(
            matrix.column_bounds,
            vec![
                ColumnBounds { x: 0.0, width: 100.0 },
                ColumnBounds { x: 100.0, width: 100.0 },
            ]
        );
    }

    #[test]
    fn test_empty_input_has_one_column() {
        let matrix = build_matrix(&[], &LayoutOptions::default());
        assert_eq!(matrix.column_count, 1);
        assert_eq!(matrix.row_count, 0);
        assert_eq!(matrix.column_bounds.len(), 1);
    }

    #[test]
    fn test_to_tsv() {
        let matrix = build_matrix(&[row("a   b"), row("c")], &LayoutOptions::default());
        assert_eq!(matrix.to_tsv(), "a\tb\nc\t");
    }
}
