//! Per-page rendering and reassembly of page output
//!
//! Each page is rendered on its own into a self-contained JSON array of
//! [`FormattedRow`]s. The page outputs are then concatenated as raw text with
//! no separator, which is exactly what the reassembly step has to undo.

use crate::extractor::{LopdfPage, PageText, RenderOptions};
use crate::glyph::GlyphRun;
use crate::rows::{format_rows, group_into_rows, FormattedRow, LayoutOptions};
use crate::PdfError;
use lopdf::Document;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::de::DeserializeOwned;

/// One array's closing bracket directly followed by the next one's opening
static ARRAY_SEAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\]\[").unwrap());

/// Render one page to its serialized rows.
///
/// Pure per call: the result depends only on this page, so pages can be
/// rendered in any order and reduced by the caller.
pub fn render_page<P: PageText + ?Sized>(
    page: &P,
    render_options: &RenderOptions,
    layout: &LayoutOptions,
) -> Result<String, PdfError> {
    let glyphs = page.get_text_content(render_options)?;
    let rows = group_into_rows(glyphs, layout.row_tolerance);
    let formatted = format_rows(rows, layout);

    Ok(serde_json::to_string(&formatted)?)
}

/// Render every page of a document and reduce the output to one row sequence
pub fn render_document(
    doc: &Document,
    render_options: &RenderOptions,
    layout: &LayoutOptions,
) -> Result<Vec<FormattedRow>, PdfError> {
    // Decoding walks the shared document; rendering only needs each page's glyphs
    let decoded: Vec<Vec<GlyphRun>> = doc
        .get_pages()
        .into_values()
        .map(|page_id| LopdfPage::new(doc, page_id).get_text_content(render_options))
        .collect::<Result<_, _>>()?;

    let rendered: Vec<String> = decoded
        .par_iter()
        .map(|glyphs| render_page(glyphs.as_slice(), render_options, layout))
        .collect::<Result<_, _>>()?;

    log::debug!("rendered {} pages", rendered.len());

    if rendered.is_empty() {
        return Ok(Vec::new());
    }

    reassemble_pages(&rendered.concat())
}

/// Split concatenated page arrays apart and parse each one.
///
/// The arrays are read one after another with a streaming JSON reader, so
/// brackets inside string values never count as a seam. If the stream hits
/// a malformed array, the rest of the input is cut at every `][` seam, the
/// missing brackets are restored on each fragment and each fragment is
/// parsed on its own; fragments that fail are logged and skipped. Fails only
/// when nothing parses.
pub fn reassemble_pages<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, PdfError> {
    let raw = raw.trim();

    let mut items = Vec::new();
    let mut parsed_any = false;
    let mut last_error = None;

    let mut stream = serde_json::Deserializer::from_str(raw).into_iter::<Vec<T>>();
    while let Some(next) = stream.next() {
        match next {
            Ok(page_items) => {
                parsed_any = true;
                items.extend(page_items);
            }
            Err(e) => {
                let offset = stream.byte_offset();
                log::debug!("page stream broke at byte {}: {}", offset, e);
                last_error = Some(e);

                let (recovered, error) = parse_fragments(raw[offset..].trim());
                if let Some(page_items) = recovered {
                    parsed_any = true;
                    items.extend(page_items);
                }
                if error.is_some() {
                    last_error = error;
                }
                break;
            }
        }
    }

    if parsed_any {
        Ok(items)
    } else {
        Err(PdfError::Reassembly(match last_error {
            Some(e) => e.to_string(),
            None => "no page arrays".to_string(),
        }))
    }
}

/// Seam-split fallback for input the streaming reader rejected
fn parse_fragments<T: DeserializeOwned>(
    raw: &str,
) -> (Option<Vec<T>>, Option<serde_json::Error>) {
    let pieces: Vec<&str> = ARRAY_SEAM_RE.split(raw).collect();
    let last = pieces.len() - 1;

    let mut items = None;
    let mut last_error = None;

    for (i, piece) in pieces.iter().enumerate() {
        let mut fragment = String::with_capacity(piece.len() + 2);
        if i > 0 {
            fragment.push('[');
        }
        fragment.push_str(piece);
        if i < last {
            fragment.push(']');
        }

        match serde_json::from_str::<Vec<T>>(&fragment) {
            Ok(page_items) => items.get_or_insert_with(Vec::new).extend(page_items),
            Err(e) => {
                log::warn!("skipping malformed page fragment {}: {}", i, e);
                last_error = Some(e);
            }
        }
    }

    (items, last_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakePage(Vec<GlyphRun>);

    impl PageText for FakePage {
        fn get_text_content(&self, _options: &RenderOptions) -> Result<Vec<GlyphRun>, PdfError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_reassemble_concatenated_arrays() {
        let items: Vec<i64> = reassemble_pages("[1,2][3,4]").unwrap();
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_reassemble_single_array() {
        let items: Vec<i64> = reassemble_pages("[5,6]").unwrap();
        assert_eq!(items, vec![5, 6]);
    }

    #[test]
    fn test_reassemble_middle_fragments_and_nesting() {
        let items: Vec<Vec<i64>> = reassemble_pages("[[1],[2]][[3]][[4,5]]").unwrap();
        assert_eq!(items, vec![vec![1], vec![2], vec![3], vec![4, 5]]);
    }

    #[test]
    fn test_reassemble_skips_bad_fragment() {
        let items: Vec<i64> = reassemble_pages("[1,2][oops][3]").unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn test_reassemble_ignores_brackets_inside_strings() {
        let items: Vec<String> = reassemble_pages(r#"["a]  [b","x][y"]["c"]"#).unwrap();
        assert_eq!(items, vec!["a]  [b", "x][y", "c"]);
    }

    #[test]
    fn test_reassemble_recovers_after_bad_page() {
        let items: Vec<String> = reassemble_pages(r#"["a]"]["b"][oops]["c"]"#).unwrap();
        assert_eq!(items, vec!["a]", "b", "c"]);

        let items: Vec<i64> = reassemble_pages("[1][2,][3]").unwrap();
        assert_eq!(items, vec![1, 3]);
    }

    #[test]
    fn test_reassemble_fails_on_empty_input() {
        let result = reassemble_pages::<i64>("  ");
        assert!(matches!(result, Err(PdfError::Reassembly(_))));
    }

    #[test]
    fn test_rotated_flipped_markers_survive_reassembly() {
        let first = FakePage(vec![
            GlyphRun::new("A", [10.0, 0.0, 0.0, 10.0, 0.0, 700.0]),
            GlyphRun::new("B", [-7.0, 7.0, -7.0, -7.0, 20.0, 700.0]),
            GlyphRun::new("Other", [10.0, 0.0, 0.0, 10.0, 0.0, 600.0]),
        ]);
        let second = FakePage(vec![GlyphRun::new("P2", [10.0, 0.0, 0.0, 10.0, 0.0, 700.0])]);
        let layout = LayoutOptions::default();
        let options = RenderOptions::default();

        let raw = render_page(&first, &options, &layout).unwrap()
            + &render_page(&second, &options, &layout).unwrap();
        let rows: Vec<FormattedRow> = reassemble_pages(&raw).unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows[0].text.starts_with('A'));
        assert!(rows[0].text.ends_with("[ROTATED]  [FLIPPED] B"));
        assert_eq!(rows[1].text, "Other");
        assert_eq!(rows[2].text, "P2");
    }

    #[test]
    fn test_reassemble_fails_when_nothing_parses() {
        let result = reassemble_pages::<i64>("not json");
        assert!(matches!(result, Err(PdfError::Reassembly(_))));
    }

    #[test]
    fn test_render_page_round_trips_rows() {
        let page = FakePage(vec![
            GlyphRun::new("Date", [10.0, 0.0, 0.0, 10.0, 0.0, 700.0]),
            GlyphRun::new("Amount", [10.0, 0.0, 0.0, 10.0, 100.0, 700.0]),
            GlyphRun::new("01/02/2024", [10.0, 0.0, 0.0, 10.0, 0.0, 680.0]),
        ]);
        let layout = LayoutOptions::default();
        let first = render_page(&page, &RenderOptions::default(), &layout).unwrap();
        let second = render_page(&page, &RenderOptions::default(), &layout).unwrap();

        let rows: Vec<FormattedRow> = reassemble_pages(&(first + &second)).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].text, format!("Date{}Amount", " ".repeat(15)));
        assert_eq!(rows[1].text, "01/02/2024");
        assert_eq!(rows[2], rows[0]);
    }
}
