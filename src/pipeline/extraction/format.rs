use std::io::Read;
use std::path::Path;

use super::types::DocumentKind;
use super::ExtractionError;

/// Bytes inspected when deciding whether a file is plain text.
const TEXT_SNIFF_BYTES: u64 = 8 * 1024;

/// Detect the document kind from magic bytes (NOT file extensions).
pub fn detect_kind(path: &Path) -> Result<DocumentKind, ExtractionError> {
    let mut file = std::fs::File::open(path)?;
    let mut header = [0u8; 5];
    let read = file.read(&mut header)?;

    if header[..read].starts_with(b"%PDF") {
        return Ok(DocumentKind::Pdf);
    }

    let mut sample = Vec::new();
    std::fs::File::open(path)?
        .take(TEXT_SNIFF_BYTES)
        .read_to_end(&mut sample)?;

    if is_likely_text(&sample) {
        Ok(DocumentKind::PlainText)
    } else {
        Ok(DocumentKind::Unsupported)
    }
}

/// UTF-8 without NUL bytes. A multi-byte sequence cut by the sample
/// boundary still counts as text.
fn is_likely_text(sample: &[u8]) -> bool {
    if sample.contains(&0) {
        return false;
    }
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}
