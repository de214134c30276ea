use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pipeline::extraction::BinaryCheck;

/// 0 = match, 1 = mismatch, as written to the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Verdict {
    Match,
    Mismatch,
}

impl Verdict {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Match => 0,
            Self::Mismatch => 1,
        }
    }

    pub fn is_match(self) -> bool {
        self == Self::Match
    }
}

impl From<Verdict> for u8 {
    fn from(v: Verdict) -> u8 {
        v.as_u8()
    }
}

impl TryFrom<u8> for Verdict {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Match),
            1 => Ok(Self::Mismatch),
            other => Err(format!("verdict must be 0 or 1, got {other}")),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Which side of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

/// Why a section got its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictReason {
    BinaryMatch,
    AbsentInBoth,
    /// Absent in both but the section is expected to always exist.
    AbsentInBothRequired,
    PresenceMismatch { present_in: Side },
    EmptyTable,
    ContentVolumeMismatch,
    DataMatch,
    DataDiscrepancy { only_in_a: usize, only_in_b: usize },
    /// Summary forced to 1 because a detail section it aggregates failed.
    InferredFailure,
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BinaryMatch => write!(f, "Verified Binary Match"),
            Self::AbsentInBoth => write!(f, "Section missing in both sources (Acceptable)"),
            Self::AbsentInBothRequired => {
                write!(f, "Section missing in both sources (Detection error)")
            }
            Self::PresenceMismatch { present_in } => {
                let side = match present_in {
                    Side::A => "A",
                    Side::B => "B",
                };
                write!(f, "Section presence mismatch (only in source {side})")
            }
            Self::EmptyTable => write!(f, "Empty table in both sources"),
            Self::ContentVolumeMismatch => write!(f, "Content volume mismatch"),
            Self::DataMatch => write!(f, "Data Match"),
            Self::DataDiscrepancy { only_in_a, only_in_b } => {
                if *only_in_a == 0 && *only_in_b == 0 {
                    write!(f, "Data Discrepancy Identified")
                } else {
                    write!(
                        f,
                        "Data Discrepancy Identified ({only_in_a} words only in A, {only_in_b} only in B)"
                    )
                }
            }
            Self::InferredFailure => write!(f, "Inferred failure (detail section mismatch)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionVerdict {
    pub key: String,
    pub verdict: Verdict,
    pub reason: VerdictReason,
    pub present_a: bool,
    pub present_b: bool,
}

impl SectionVerdict {
    pub fn inferred(&self) -> bool {
        self.reason == VerdictReason::InferredFailure
    }
}

/// Outcome of comparing one pair of documents.
#[derive(Debug, Clone)]
pub struct ComparisonVerdict {
    pub sections: Vec<SectionVerdict>,
    pub overall: Verdict,
    pub binary: BinaryCheck,
}

impl ComparisonVerdict {
    pub fn from_sections(sections: Vec<SectionVerdict>, binary: BinaryCheck) -> Self {
        let overall = if sections.iter().all(|s| s.verdict.is_match()) {
            Verdict::Match
        } else {
            Verdict::Mismatch
        };
        Self {
            sections,
            overall,
            binary,
        }
    }

    pub fn is_binary_match(&self) -> bool {
        self.binary.is_identical()
    }

    pub fn section(&self, key: &str) -> Option<&SectionVerdict> {
        self.sections.iter().find(|s| s.key == key)
    }
}
