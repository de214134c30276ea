use serde::{Deserialize, Serialize};

/// How two normalized section texts are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStrategy {
    /// Normalized strings must be equal.
    Exact,
    /// Same words with the same counts, in any order. Tolerates the
    /// reordering that text extraction introduces in tables.
    WordMultiset,
}

/// Per-section comparison rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionPolicy {
    /// Absence from both documents counts as a detection error.
    pub required: bool,
    pub strategy: ComparisonStrategy,
    /// Remove every occurrence of the start marker before comparing, so a
    /// page header repeated on each page does not enter the diff.
    pub purge_marker: bool,
    /// Normalized content shorter than this (in chars) is an empty table.
    pub min_content_chars: usize,
}

impl Default for SectionPolicy {
    fn default() -> Self {
        Self {
            required: true,
            strategy: ComparisonStrategy::WordMultiset,
            purge_marker: true,
            min_content_chars: 15,
        }
    }
}

/// A marker-delimited region of a report. No end marker means the region
/// runs to the next section or the end of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub key: String,
    pub start_marker: String,
    #[serde(default)]
    pub end_marker: Option<String>,
    #[serde(default)]
    pub policy: SectionPolicy,
}

impl Section {
    pub fn new(
        key: impl Into<String>,
        start_marker: impl Into<String>,
        end_marker: Option<&str>,
        policy: SectionPolicy,
    ) -> Self {
        Self {
            key: key.into(),
            start_marker: start_marker.into(),
            end_marker: end_marker.map(str::to_string),
            policy,
        }
    }
}
