use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// How text was obtained from a document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    PdfTextLayer,
    PlainTextRead,
}

/// Broad document kinds, detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
    Unsupported,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PlainText => "plain_text",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Raw text of one document, page by page.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub method: ExtractionMethod,
    pub pages: Vec<String>,
}

impl ExtractedDocument {
    /// All pages joined in order. Sections may span page breaks.
    pub fn full_text(&self) -> String {
        self.pages.join("\n")
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Text extraction abstraction (allows mocking for tests)
pub trait TextSource {
    fn extract(&self, path: &Path) -> Result<ExtractedDocument, ExtractionError>;
}
