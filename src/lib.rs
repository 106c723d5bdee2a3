//! Row, table and transaction reconstruction from positioned PDF text
//!
//! This crate provides:
//! - Glyph extraction with full placement transforms, using lopdf
//! - Row grouping and row text formatting with inferred spacing and style
//! - Reassembly of independently rendered pages into one row sequence
//! - A rectangular cell matrix built from the formatted rows
//! - Bank statement transaction extraction from the decoder's plain text

pub mod extractor;
pub mod glyph;
pub mod matrix;
pub mod pages;
pub mod rows;
pub mod transactions;

pub use extractor::{PageText, RenderOptions};
pub use glyph::{GlyphRun, TextEffects};
pub use matrix::{build_matrix, ColumnBounds, Matrix};
pub use pages::{reassemble_pages, render_document, render_page};
pub use rows::{format_rows, group_into_rows, FormattedRow, LayoutOptions, StyleTag};
pub use transactions::{parse_transactions, ExtractedData, StatementFormat, Transaction};

use std::path::Path;

/// Layout reconstruction result for a whole document
#[derive(Debug)]
pub struct DocumentLayout {
    /// Page count
    pub page_count: u32,
    /// Formatted rows of every page, in page order
    pub rows: Vec<FormattedRow>,
    /// Rectangular cell view of `rows`
    pub matrix: Matrix,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Reconstruct rows and the cell matrix of a PDF file
pub fn process_pdf<P: AsRef<Path>>(path: P) -> Result<DocumentLayout, PdfError> {
    let buffer = std::fs::read(path)?;
    process_pdf_mem(&buffer)
}

/// Reconstruct rows and the cell matrix from a memory buffer
pub fn process_pdf_mem(buffer: &[u8]) -> Result<DocumentLayout, PdfError> {
    process_pdf_mem_with_options(buffer, &RenderOptions::default(), &LayoutOptions::default())
}

/// Reconstruct rows and the cell matrix with custom options
pub fn process_pdf_mem_with_options(
    buffer: &[u8],
    render_options: &RenderOptions,
    layout: &LayoutOptions,
) -> Result<DocumentLayout, PdfError> {
    let start = std::time::Instant::now();

    let doc = extractor::load_document(buffer)?;
    let page_count = doc.get_pages().len() as u32;

    let rows = render_document(&doc, render_options, layout)?;
    if rows.is_empty() {
        return Err(PdfError::NoRows);
    }

    let matrix = build_matrix(&rows, layout);
    log::debug!(
        "{} pages -> {} rows x {} columns",
        page_count,
        matrix.row_count,
        matrix.column_count
    );

    Ok(DocumentLayout {
        page_count,
        rows,
        matrix,
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

/// Extract statement transactions from a PDF file
pub fn extract_transactions<P: AsRef<Path>>(path: P) -> Result<ExtractedData, PdfError> {
    let buffer = std::fs::read(path)?;
    extract_transactions_mem(&buffer)
}

/// Extract statement transactions from a memory buffer
pub fn extract_transactions_mem(buffer: &[u8]) -> Result<ExtractedData, PdfError> {
    extract_transactions_mem_with_format(buffer, &StatementFormat::default())
}

/// Extract transactions using a specific statement format
pub fn extract_transactions_mem_with_format(
    buffer: &[u8],
    format: &StatementFormat,
) -> Result<ExtractedData, PdfError> {
    let text = extractor::extract_text_mem(buffer)?;
    if text.trim().is_empty() {
        return Err(PdfError::NoText);
    }

    parse_transactions(&text, format)
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("PDF decoder attempted filesystem access while parsing an in-memory document: {0}")]
    DecoderFilesystemAccess(String),
    #[error("Failed to reassemble page rows: {0}")]
    Reassembly(String),
    #[error("Failed to serialize page rows: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("No text content extracted from PDF")]
    NoText,
    #[error("No rows found in the PDF")]
    NoRows,
    #[error("No transaction-like lines found in the PDF")]
    NoTransactions,
}

impl From<lopdf::Error> for PdfError {
    fn from(e: lopdf::Error) -> Self {
        if caused_by_io(&e) {
            PdfError::DecoderFilesystemAccess(e.to_string())
        } else {
            PdfError::Parse(e.to_string())
        }
    }
}

/// Whether an I/O error sits anywhere in the error's source chain
fn caused_by_io(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.is::<std::io::Error>() {
            return true;
        }
        current = e.source();
    }
    false
}
