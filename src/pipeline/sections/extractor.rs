//! Anchor-marker section location over raw extracted text.
//!
//! Each section is located independently: first case-insensitive hit of its
//! start marker, bounded by its end marker, else by the nearest start marker
//! of any other section, else by the end of the text. Global ordering of the
//! sections is never validated.

use regex::{Regex, RegexBuilder};

use super::types::Section;

/// What terminated a section slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    EndMarker,
    /// Start marker of the section at this index.
    NextSection(usize),
    EndOfText,
}

/// A located section. `text` starts at the start marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSlice<'t> {
    pub start: usize,
    pub end: usize,
    pub boundary: Boundary,
    pub text: &'t str,
}

struct CompiledSection {
    start: Regex,
    end: Option<Regex>,
}

pub struct SectionExtractor {
    sections: Vec<CompiledSection>,
}

/// Literal, case-insensitive marker pattern.
fn marker_regex(marker: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&regex::escape(marker))
        .case_insensitive(true)
        .build()
}

impl SectionExtractor {
    pub fn new(sections: &[Section]) -> Result<Self, regex::Error> {
        let sections = sections
            .iter()
            .map(|s| {
                Ok(CompiledSection {
                    start: marker_regex(&s.start_marker)?,
                    end: s.end_marker.as_deref().map(marker_regex).transpose()?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { sections })
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Start marker pattern of the section at `index`.
    pub fn start_pattern(&self, index: usize) -> &Regex {
        &self.sections[index].start
    }

    /// Locate the section at `index`, or `None` when its start marker is absent.
    pub fn extract<'t>(&self, index: usize, text: &'t str) -> Option<SectionSlice<'t>> {
        let section = &self.sections[index];
        let start_match = section.start.find(text)?;
        let start = start_match.start();
        let search_from = start_match.end();

        let explicit = section
            .end
            .as_ref()
            .and_then(|end| end.find_at(text, search_from))
            .map(|m| (m.start(), Boundary::EndMarker));

        let (end, boundary) = explicit
            .or_else(|| self.nearest_other_start(index, text, search_from))
            .unwrap_or((text.len(), Boundary::EndOfText));

        Some(SectionSlice {
            start,
            end,
            boundary,
            text: &text[start..end],
        })
    }

    /// Locate every section, in definition order.
    pub fn extract_all<'t>(&self, text: &'t str) -> Vec<Option<SectionSlice<'t>>> {
        (0..self.sections.len())
            .map(|index| self.extract(index, text))
            .collect()
    }

    fn nearest_other_start(
        &self,
        index: usize,
        text: &str,
        from: usize,
    ) -> Option<(usize, Boundary)> {
        self.sections
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != index)
            .filter_map(|(other, s)| {
                s.start
                    .find_at(text, from)
                    .map(|m| (m.start(), Boundary::NextSection(other)))
            })
            .min_by_key(|(pos, _)| *pos)
    }
}
