use regex::Regex;

use super::LinkageError;

/// Derives the comparison key of a file name by cutting it at the first
/// year-like token (`Acme_2026-01-05.pdf` → `Acme`).
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    year_token: Regex,
}

impl NameNormalizer {
    pub fn new(year_token_pattern: &str) -> Result<Self, LinkageError> {
        Ok(Self {
            year_token: Regex::new(year_token_pattern)?,
        })
    }

    /// Base key of an identifier. Names without a year token are returned
    /// whole (trimmed).
    pub fn base_key<'a>(&self, identifier: &'a str) -> &'a str {
        let cut = self
            .year_token
            .find(identifier)
            .map_or(identifier.len(), |m| m.start());
        identifier[..cut].trim()
    }
}
