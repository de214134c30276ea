//! Extractor used by the comparison engine: dispatches on detected kind.

use std::path::Path;

use super::format::detect_kind;
use super::pdf::PdfTextExtractor;
use super::types::{DocumentKind, ExtractedDocument, ExtractionMethod, TextSource};
use super::ExtractionError;

/// Reads the text layer of digital PDFs and the content of UTF-8 exports.
pub struct DocumentTextExtractor;

impl TextSource for DocumentTextExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedDocument, ExtractionError> {
        let kind = detect_kind(path)?;

        let document = match kind {
            DocumentKind::Pdf => {
                let bytes = std::fs::read(path)?;
                ExtractedDocument {
                    method: ExtractionMethod::PdfTextLayer,
                    pages: PdfTextExtractor.extract_pages(&bytes)?,
                }
            }
            DocumentKind::PlainText => {
                let bytes = std::fs::read(path)?;
                let text = String::from_utf8(bytes)
                    .map_err(|e| ExtractionError::EncodingError(e.to_string()))?;
                ExtractedDocument {
                    method: ExtractionMethod::PlainTextRead,
                    pages: vec![text],
                }
            }
            DocumentKind::Unsupported => {
                return Err(ExtractionError::UnsupportedFormat(path.to_path_buf()));
            }
        };

        if document.pages.iter().all(|p| p.trim().is_empty()) {
            return Err(ExtractionError::EmptyDocument(path.to_path_buf()));
        }

        tracing::debug!(
            path = %path.display(),
            kind = kind.as_str(),
            pages = document.page_count(),
            "Text layer extracted"
        );

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::pdf::test_support::make_test_pdf;

    #[test]
    fn plain_text_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.pdf");
        std::fs::write(&path, "Calls by Hour of Day\n08:00 3").unwrap();

        let doc = DocumentTextExtractor.extract(&path).unwrap();
        assert_eq!(doc.method, ExtractionMethod::PlainTextRead);
        assert_eq!(doc.full_text(), "Calls by Hour of Day\n08:00 3");
    }

    #[test]
    fn pdf_goes_through_text_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.pdf");
        std::fs::write(&path, make_test_pdf(&["Calls by Day of Week", "Monday 9"])).unwrap();

        let doc = DocumentTextExtractor.extract(&path).unwrap();
        assert_eq!(doc.method, ExtractionMethod::PdfTextLayer);
        assert!(doc.full_text().contains("Monday"));
    }

    #[test]
    fn corrupt_pdf_is_extraction_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.7\ngarbage without xref").unwrap();

        assert!(DocumentTextExtractor.extract(&path).is_err());
    }

    #[test]
    fn binary_blob_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.pdf");
        std::fs::write(&path, [0x89u8, 0x50, 0x4E, 0x47, 0x00, 0x00]).unwrap();

        assert!(matches!(
            DocumentTextExtractor.extract(&path),
            Err(ExtractionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn whitespace_only_is_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "  \n\t ").unwrap();

        assert!(matches!(
            DocumentTextExtractor.extract(&path),
            Err(ExtractionError::EmptyDocument(_))
        ));
    }
}
