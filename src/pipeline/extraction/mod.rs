//! Text layer extraction and byte-level document identity.
//!
//! Comparison only ever needs the raw text layer: no OCR, no layout analysis.

pub mod types;
pub mod format;
pub mod digest;
pub mod pdf;
pub mod document;

pub use types::*;
pub use format::detect_kind;
pub use digest::{content_digest, compare_bytes, BinaryCheck, ReadError};
pub use pdf::PdfTextExtractor;
pub use document::DocumentTextExtractor;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Text encoding error: {0}")]
    EncodingError(String),

    #[error("Unsupported format for extraction: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Document has no text layer: {0}")]
    EmptyDocument(PathBuf),
}
