use std::collections::BTreeMap;

use regex::Regex;

/// Collapse every whitespace run to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized section content, optionally without its start marker text.
pub fn normalize_section(text: &str, purge: Option<&Regex>) -> String {
    match purge {
        Some(marker) => collapse_whitespace(&marker.replace_all(text, " ")),
        None => collapse_whitespace(text),
    }
}

/// Word counts of a normalized text.
pub fn word_multiset(text: &str) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for word in text.split_whitespace() {
        *counts.entry(word).or_insert(0) += 1;
    }
    counts
}

/// Words present in `a` but not `b`, and in `b` but not `a`, with multiplicity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultisetDiff {
    pub only_in_a: usize,
    pub only_in_b: usize,
}

impl MultisetDiff {
    pub fn is_empty(&self) -> bool {
        self.only_in_a == 0 && self.only_in_b == 0
    }
}

pub fn multiset_diff(a: &str, b: &str) -> MultisetDiff {
    let counts_a = word_multiset(a);
    let counts_b = word_multiset(b);
    let mut diff = MultisetDiff::default();

    for (word, &n) in &counts_a {
        diff.only_in_a += n.saturating_sub(counts_b.get(word).copied().unwrap_or(0));
    }
    for (word, &n) in &counts_b {
        diff.only_in_b += n.saturating_sub(counts_a.get(word).copied().unwrap_or(0));
    }
    diff
}
