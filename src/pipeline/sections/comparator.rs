//! Pairwise document comparison with binary short-circuit and summary cascade.

use std::path::Path;

use super::extractor::{SectionExtractor, SectionSlice};
use super::normalize::{multiset_diff, normalize_section};
use super::types::{ComparisonStrategy, Section};
use super::verdict::*;
use super::ComparisonError;
use crate::pipeline::extraction::{compare_bytes, TextSource};

pub struct SectionComparator<'c> {
    sections: &'c [Section],
    summary_key: &'c str,
    extractor: SectionExtractor,
    source: &'c dyn TextSource,
}

impl<'c> SectionComparator<'c> {
    pub fn new(
        sections: &'c [Section],
        summary_key: &'c str,
        source: &'c dyn TextSource,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            sections,
            summary_key,
            extractor: SectionExtractor::new(sections)?,
            source,
        })
    }

    /// Compare two documents on disk. Byte-identical files are a match
    /// without any text extraction.
    pub fn compare_files(
        &self,
        path_a: &Path,
        path_b: &Path,
    ) -> Result<ComparisonVerdict, ComparisonError> {
        for path in [path_a, path_b] {
            if !path.is_file() {
                return Err(ComparisonError::MissingInput(path.to_path_buf()));
            }
        }

        let binary = compare_bytes(path_a, path_b).map_err(|e| ComparisonError::Io {
            path: e.path,
            source: e.source,
        })?;

        if binary.is_identical() {
            tracing::debug!(a = %path_a.display(), b = %path_b.display(), "Exact binary match");
            let sections = self
                .sections
                .iter()
                .map(|s| SectionVerdict {
                    key: s.key.clone(),
                    verdict: Verdict::Match,
                    reason: VerdictReason::BinaryMatch,
                    present_a: true,
                    present_b: true,
                })
                .collect();
            return Ok(ComparisonVerdict::from_sections(sections, binary));
        }

        let text_a = self.extract(path_a)?;
        let text_b = self.extract(path_b)?;

        Ok(ComparisonVerdict::from_sections(
            self.compare_texts(&text_a, &text_b),
            binary,
        ))
    }

    /// Section verdicts for two extracted texts, cascade applied.
    pub fn compare_texts(&self, text_a: &str, text_b: &str) -> Vec<SectionVerdict> {
        let slices_a = self.extractor.extract_all(text_a);
        let slices_b = self.extractor.extract_all(text_b);

        let mut verdicts: Vec<SectionVerdict> = self
            .sections
            .iter()
            .enumerate()
            .map(|(index, section)| {
                self.compare_section(index, section, slices_a[index], slices_b[index])
            })
            .collect();

        apply_cascade(&mut verdicts, self.summary_key);
        verdicts
    }

    fn extract(&self, path: &Path) -> Result<String, ComparisonError> {
        self.source
            .extract(path)
            .map(|doc| doc.full_text())
            .map_err(|source| ComparisonError::Extraction {
                path: path.to_path_buf(),
                source,
            })
    }

    fn compare_section(
        &self,
        index: usize,
        section: &Section,
        slice_a: Option<SectionSlice<'_>>,
        slice_b: Option<SectionSlice<'_>>,
    ) -> SectionVerdict {
        let (verdict, reason) = match (slice_a, slice_b) {
            (None, None) if section.policy.required => {
                (Verdict::Mismatch, VerdictReason::AbsentInBothRequired)
            }
            (None, None) => (Verdict::Match, VerdictReason::AbsentInBoth),
            (Some(_), None) => (
                Verdict::Mismatch,
                VerdictReason::PresenceMismatch { present_in: Side::A },
            ),
            (None, Some(_)) => (
                Verdict::Mismatch,
                VerdictReason::PresenceMismatch { present_in: Side::B },
            ),
            (Some(a), Some(b)) => self.compare_content(index, section, a.text, b.text),
        };

        SectionVerdict {
            key: section.key.clone(),
            verdict,
            reason,
            present_a: slice_a.is_some(),
            present_b: slice_b.is_some(),
        }
    }

    fn compare_content(
        &self,
        index: usize,
        section: &Section,
        raw_a: &str,
        raw_b: &str,
    ) -> (Verdict, VerdictReason) {
        let policy = &section.policy;
        let purge = policy
            .purge_marker
            .then(|| self.extractor.start_pattern(index));
        let a = normalize_section(raw_a, purge);
        let b = normalize_section(raw_b, purge);

        let short_a = a.chars().count() < policy.min_content_chars;
        let short_b = b.chars().count() < policy.min_content_chars;
        match (short_a, short_b) {
            (true, true) => return (Verdict::Match, VerdictReason::EmptyTable),
            (true, false) | (false, true) => {
                return (Verdict::Mismatch, VerdictReason::ContentVolumeMismatch)
            }
            (false, false) => {}
        }

        match policy.strategy {
            ComparisonStrategy::Exact if a == b => (Verdict::Match, VerdictReason::DataMatch),
            ComparisonStrategy::Exact => {
                let diff = multiset_diff(&a, &b);
                (
                    Verdict::Mismatch,
                    VerdictReason::DataDiscrepancy {
                        only_in_a: diff.only_in_a,
                        only_in_b: diff.only_in_b,
                    },
                )
            }
            ComparisonStrategy::WordMultiset => {
                let diff = multiset_diff(&a, &b);
                if diff.is_empty() {
                    (Verdict::Match, VerdictReason::DataMatch)
                } else {
                    (
                        Verdict::Mismatch,
                        VerdictReason::DataDiscrepancy {
                            only_in_a: diff.only_in_a,
                            only_in_b: diff.only_in_b,
                        },
                    )
                }
            }
        }
    }
}

/// The summary aggregates the detail sections: when it compared equal while
/// genuinely present on both sides and any detail failed, it is forced to 1.
pub fn apply_cascade(verdicts: &mut [SectionVerdict], summary_key: &str) {
    let detail_failed = verdicts
        .iter()
        .any(|v| v.key != summary_key && !v.verdict.is_match());
    if !detail_failed {
        return;
    }

    if let Some(summary) = verdicts.iter_mut().find(|v| v.key == summary_key) {
        if summary.verdict.is_match() && summary.present_a && summary.present_b {
            tracing::debug!(section = summary_key, "Summary overridden by detail failure");
            summary.verdict = Verdict::Mismatch;
            summary.reason = VerdictReason::InferredFailure;
        }
    }
}
