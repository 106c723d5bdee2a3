//! Glyph extraction from PDF using lopdf
//!
//! This module plays the page decoder: it walks each page's content stream,
//! tracks the graphics and text state, and emits one positioned [`GlyphRun`]
//! per shown string. It also exposes the decoder's plain-text output, which
//! the transaction parser consumes.

use crate::glyph::{GlyphRun, IDENTITY};
use crate::PdfError;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;

/// Bytes searched for the `%PDF-` signature
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Approximate advance per character, as a fraction of the font size,
/// used when `TJ` pieces are emitted separately
const ESTIMATED_CHAR_WIDTH: f64 = 0.5;

/// Options passed to [`PageText::get_text_content`]
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Collapse whitespace runs inside each glyph's text to a single space
    pub normalize_whitespace: bool,
    /// Emit each string of a `TJ` array as its own glyph run
    pub disable_combine_text_items: bool,
}

/// A page that can produce its positioned glyph runs
pub trait PageText {
    fn get_text_content(&self, options: &RenderOptions) -> Result<Vec<GlyphRun>, PdfError>;
}

/// Glyphs already decoded from a page
impl PageText for [GlyphRun] {
    fn get_text_content(&self, _options: &RenderOptions) -> Result<Vec<GlyphRun>, PdfError> {
        Ok(self.to_vec())
    }
}

/// A page of a loaded lopdf document
pub struct LopdfPage<'a> {
    doc: &'a Document,
    page_id: ObjectId,
}

impl<'a> LopdfPage<'a> {
    pub fn new(doc: &'a Document, page_id: ObjectId) -> Self {
        Self { doc, page_id }
    }
}

impl PageText for LopdfPage<'_> {
    fn get_text_content(&self, options: &RenderOptions) -> Result<Vec<GlyphRun>, PdfError> {
        extract_page_glyphs(self.doc, self.page_id, options)
    }
}

/// Reject buffers that cannot be a PDF before handing them to the decoder
pub fn validate_pdf_buffer(buffer: &[u8]) -> Result<(), PdfError> {
    if buffer.is_empty() {
        return Err(PdfError::InvalidInput("PDF buffer is empty".to_string()));
    }

    let window = &buffer[..buffer.len().min(HEADER_SEARCH_WINDOW)];
    if !window.windows(5).any(|w| w == b"%PDF-") {
        return Err(PdfError::InvalidInput(
            "buffer does not start with a %PDF- header".to_string(),
        ));
    }

    Ok(())
}

/// Validate and decode a PDF held in memory
pub fn load_document(buffer: &[u8]) -> Result<Document, PdfError> {
    validate_pdf_buffer(buffer)?;
    Ok(Document::load_mem(buffer)?)
}

/// Extract the decoder's plain text for every page
pub fn extract_text_mem(buffer: &[u8]) -> Result<String, PdfError> {
    let doc = load_document(buffer)?;
    extract_text_from_doc(&doc)
}

/// Extract plain text from loaded document
fn extract_text_from_doc(doc: &Document) -> Result<String, PdfError> {
    let pages = doc.get_pages();
    let page_nums: Vec<u32> = pages.keys().cloned().collect();

    Ok(doc.extract_text(&page_nums)?)
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f64; 6], m2: &[f64; 6]) -> [f64; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Text state carried across operators inside a content stream
struct TextState {
    ctm: [f64; 6],
    ctm_stack: Vec<[f64; 6]>,
    font: String,
    font_size: f64,
    leading: f64,
    rise: f64,
    text_matrix: [f64; 6],
    line_matrix: [f64; 6],
    in_text_block: bool,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            font: String::new(),
            font_size: 12.0,
            leading: 0.0,
            rise: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text_block: false,
        }
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = multiply_matrices(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// Full placement of text drawn at the current position
    fn glyph_transform(&self) -> [f64; 6] {
        let size = [self.font_size, 0.0, 0.0, self.font_size, 0.0, self.rise];
        multiply_matrices(&multiply_matrices(&size, &self.text_matrix), &self.ctm)
    }

    /// Move the text position along the baseline, in unscaled text units
    fn advance(&mut self, tx: f64) {
        self.text_matrix = multiply_matrices(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &self.text_matrix);
    }
}

/// Extract glyph runs from a single page
fn extract_page_glyphs(
    doc: &Document,
    page_id: ObjectId,
    options: &RenderOptions,
) -> Result<Vec<GlyphRun>, PdfError> {
    use lopdf::content::Content;

    let mut glyphs = Vec::new();

    // Get fonts for encoding
    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();

    let content_data = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_data)?;

    let mut state = TextState::new();

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" => {
                if let Some(matrix) = read_matrix(operands) {
                    state.ctm = multiply_matrices(&matrix, &state.ctm);
                }
            }
            "BT" => {
                state.in_text_block = true;
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "ET" => state.in_text_block = false,
            "Tf" => {
                if operands.len() >= 2 {
                    if let Ok(name) = operands[0].as_name() {
                        state.font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = get_number(&operands[1]) {
                        state.font_size = size;
                    }
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(get_number) {
                    state.leading = leading;
                }
            }
            "Ts" => {
                if let Some(rise) = operands.first().and_then(get_number) {
                    state.rise = rise;
                }
            }
            "Td" | "TD" => {
                if operands.len() >= 2 {
                    let tx = get_number(&operands[0]).unwrap_or(0.0);
                    let ty = get_number(&operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.next_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(matrix) = read_matrix(operands) {
                    state.text_matrix = matrix;
                    state.line_matrix = matrix;
                }
            }
            "T*" => state.next_line(0.0, -state.leading),
            "Tj" => {
                if let Some(operand) = operands.first() {
                    push_string(&mut glyphs, &state, operand, doc, &fonts, options);
                }
            }
            "'" => {
                state.next_line(0.0, -state.leading);
                if let Some(operand) = operands.first() {
                    push_string(&mut glyphs, &state, operand, doc, &fonts, options);
                }
            }
            "\"" => {
                state.next_line(0.0, -state.leading);
                if let Some(operand) = operands.get(2) {
                    push_string(&mut glyphs, &state, operand, doc, &fonts, options);
                }
            }
            "TJ" => {
                if let Some(Ok(array)) = operands.first().map(Object::as_array) {
                    if options.disable_combine_text_items {
                        push_array_pieces(&mut glyphs, &mut state, array, doc, &fonts, options);
                    } else {
                        let combined: String = array
                            .iter()
                            .filter_map(|item| {
                                decode_operand(item, doc, &fonts, &state.font)
                            })
                            .collect();
                        push_text(&mut glyphs, &state, combined, options);
                    }
                }
            }
            _ => {}
        }
    }

    log::debug!("page {:?}: {} glyph runs", page_id, glyphs.len());

    Ok(glyphs)
}

fn push_string(
    glyphs: &mut Vec<GlyphRun>,
    state: &TextState,
    operand: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    options: &RenderOptions,
) {
    if let Some(text) = decode_operand(operand, doc, fonts, &state.font) {
        push_text(glyphs, state, text, options);
    }
}

/// Emit each string of a `TJ` array separately, advancing by an estimated
/// width plus the array's kerning adjustments
fn push_array_pieces(
    glyphs: &mut Vec<GlyphRun>,
    state: &mut TextState,
    array: &[Object],
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    options: &RenderOptions,
) {
    let saved = state.text_matrix;

    for item in array {
        if let Some(adjustment) = get_number(item) {
            state.advance(-adjustment / 1000.0 * state.font_size);
        } else if let Some(text) = decode_operand(item, doc, fonts, &state.font) {
            let advance = text.chars().count() as f64 * state.font_size * ESTIMATED_CHAR_WIDTH;
            push_text(glyphs, state, text, options);
            state.advance(advance);
        }
    }

    state.text_matrix = saved;
}

fn push_text(glyphs: &mut Vec<GlyphRun>, state: &TextState, text: String, options: &RenderOptions) {
    if !state.in_text_block || text.trim().is_empty() {
        return;
    }

    let text = if options.normalize_whitespace {
        normalize_whitespace(&text)
    } else {
        text
    };

    glyphs.push(GlyphRun::new(text, state.glyph_transform()));
}

/// Collapse every whitespace run to one ASCII space
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                result.push(' ');
            }
            in_space = true;
        } else {
            result.push(c);
            in_space = false;
        }
    }

    result
}

/// Read six numeric operands as a matrix
fn read_matrix(operands: &[Object]) -> Option<[f64; 6]> {
    if operands.len() < 6 {
        return None;
    }

    let mut matrix = IDENTITY;
    for (i, operand) in operands.iter().take(6).enumerate() {
        matrix[i] = get_number(operand).unwrap_or(IDENTITY[i]);
    }
    Some(matrix)
}

/// Helper to get f64 from Object
fn get_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Decode a string operand, handling font encoding
fn decode_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
) -> Option<String> {
    if let Object::String(bytes, _) = obj {
        if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
            if let Ok(encoding) = font_dict.get_font_encoding(doc) {
                if let Ok(text) = Document::decode_text(&encoding, bytes) {
                    return Some(text);
                }
            }
        }

        // Fallback: try UTF-16BE then Latin-1
        if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            let utf16: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                .collect();
            return Some(String::from_utf16_lossy(&utf16));
        }

        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}
