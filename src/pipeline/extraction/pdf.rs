use super::ExtractionError;

/// PDF text extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers.
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    /// Text of every page, in page order.
    pub fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        // pdf-extract panics on some malformed streams instead of returning Err.
        let result = std::panic::catch_unwind(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        });

        match result {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(ExtractionError::PdfParsing(e.to_string())),
            Err(_) => Err(ExtractionError::PdfParsing(
                "text layer decoder aborted on malformed content".into(),
            )),
        }
    }
}
