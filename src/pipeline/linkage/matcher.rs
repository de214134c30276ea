//! Multi-pass matcher: exact identity first, then timestamp-truncated keys
//! under a strict 1:1 guard, then orphan finalization.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::normalize::NameNormalizer;

/// Which pass produced a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPass {
    Exact,
    Normalized,
}

impl MatchPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
        }
    }
}

/// Two identifiers linked to one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedPair {
    pub entity_key: String,
    pub source_a: String,
    pub source_b: String,
    pub pass: MatchPass,
}

/// A base key shared by both pools that could not be linked 1:1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousKey {
    pub base_key: String,
    pub candidates_a: Vec<String>,
    pub candidates_b: Vec<String>,
}

/// Pairs and orphans together cover the input pools exactly once.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub pairs: Vec<LinkedPair>,
    pub orphans_a: Vec<String>,
    pub orphans_b: Vec<String>,
    /// Collisions pushed to the orphan lists for human review.
    pub ambiguous: Vec<AmbiguousKey>,
}

impl MatchOutcome {
    pub fn orphan_count(&self) -> usize {
        self.orphans_a.len() + self.orphans_b.len()
    }
}

pub struct Matcher {
    normalizer: NameNormalizer,
}

impl Matcher {
    pub fn new(normalizer: NameNormalizer) -> Self {
        Self { normalizer }
    }

    /// Run every pass over the two collections. Duplicated identifiers
    /// within one collection collapse to a single entry.
    pub fn run<A, B>(&self, collection_a: A, collection_b: B) -> MatchOutcome
    where
        A: IntoIterator<Item = String>,
        B: IntoIterator<Item = String>,
    {
        let mut pool_a: BTreeSet<String> = collection_a.into_iter().collect();
        let mut pool_b: BTreeSet<String> = collection_b.into_iter().collect();
        let mut outcome = MatchOutcome::default();

        tracing::info!(pool_a = pool_a.len(), pool_b = pool_b.len(), "Phase 1: exact identifier matches");
        outcome.pairs = exact_pass(&mut pool_a, &mut pool_b);
        let exact_count = outcome.pairs.len();

        tracing::info!("Phase 2: matching by truncated timestamps");
        let taken: HashSet<String> = outcome.pairs.iter().map(|p| p.entity_key.clone()).collect();
        let (normalized, ambiguous) = self.normalized_pass(&mut pool_a, &mut pool_b, &taken);
        outcome.pairs.extend(normalized);
        outcome.ambiguous = ambiguous;

        outcome.orphans_a = pool_a.into_iter().collect();
        outcome.orphans_b = pool_b.into_iter().collect();

        tracing::info!(
            exact = exact_count,
            normalized = outcome.pairs.len() - exact_count,
            orphans = outcome.orphan_count(),
            ambiguous = outcome.ambiguous.len(),
            "Matching complete"
        );

        outcome
    }

    /// Link base keys that map to exactly one identifier on each side.
    /// Consumed identifiers are removed from both pools.
    pub fn normalized_pass(
        &self,
        pool_a: &mut BTreeSet<String>,
        pool_b: &mut BTreeSet<String>,
        taken_keys: &HashSet<String>,
    ) -> (Vec<LinkedPair>, Vec<AmbiguousKey>) {
        let by_key_a = self.group_by_base_key(pool_a);
        let by_key_b = self.group_by_base_key(pool_b);

        let mut pairs = Vec::new();
        let mut ambiguous = Vec::new();

        for (base_key, candidates_a) in &by_key_a {
            let Some(candidates_b) = by_key_b.get(base_key) else {
                continue;
            };

            if base_key.is_empty() || taken_keys.contains(base_key) {
                tracing::warn!(base_key = %base_key, "Base key unusable as entity key, leaving as orphans");
                ambiguous.push(AmbiguousKey {
                    base_key: base_key.clone(),
                    candidates_a: candidates_a.clone(),
                    candidates_b: candidates_b.clone(),
                });
                continue;
            }

            match (candidates_a.as_slice(), candidates_b.as_slice()) {
                ([a], [b]) => pairs.push(LinkedPair {
                    entity_key: base_key.clone(),
                    source_a: a.clone(),
                    source_b: b.clone(),
                    pass: MatchPass::Normalized,
                }),
                _ => {
                    tracing::warn!(
                        base_key = %base_key,
                        count_a = candidates_a.len(),
                        count_b = candidates_b.len(),
                        "Truncated key collides, routing to orphans"
                    );
                    ambiguous.push(AmbiguousKey {
                        base_key: base_key.clone(),
                        candidates_a: candidates_a.clone(),
                        candidates_b: candidates_b.clone(),
                    });
                }
            }
        }

        for pair in &pairs {
            pool_a.remove(&pair.source_a);
            pool_b.remove(&pair.source_b);
        }

        (pairs, ambiguous)
    }

    fn group_by_base_key(&self, pool: &BTreeSet<String>) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for identifier in pool {
            groups
                .entry(self.normalizer.base_key(identifier).to_string())
                .or_default()
                .push(identifier.clone());
        }
        groups
    }
}

/// Link identifiers present verbatim in both pools.
pub fn exact_pass(pool_a: &mut BTreeSet<String>, pool_b: &mut BTreeSet<String>) -> Vec<LinkedPair> {
    let shared: Vec<String> = pool_a.intersection(pool_b).cloned().collect();

    shared
        .into_iter()
        .map(|identifier| {
            pool_a.remove(&identifier);
            pool_b.remove(&identifier);
            LinkedPair {
                entity_key: identifier.clone(),
                source_a: identifier.clone(),
                source_b: identifier,
                pass: MatchPass::Exact,
            }
        })
        .collect()
}
