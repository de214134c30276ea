use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::linkage::MatchPass;

/// Pipeline stages, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// External renderer produced its artifact.
    Pdf,
    /// Section comparison verdict written to the report.
    Report,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "stage_pdf",
            Self::Report => "stage_report",
        }
    }

    /// Stage that must be completed before this one.
    pub fn prerequisite(&self) -> Option<Stage> {
        match self {
            Self::Pdf => None,
            Self::Report => Some(Self::Pdf),
        }
    }

    /// Stages that depend on this one.
    pub fn dependents(&self) -> &'static [Stage] {
        match self {
            Self::Pdf => &[Self::Report],
            Self::Report => &[],
        }
    }

    pub fn all() -> &'static [Stage] {
        &[Self::Pdf, Self::Report]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Completed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

/// Linkage of one entity's two source documents plus its stage flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub entity_key: String,
    pub path_a: PathBuf,
    pub path_b: PathBuf,
    pub matched_by: MatchPass,
    #[serde(default)]
    pub stage_pdf: StageStatus,
    #[serde(default)]
    pub stage_report: StageStatus,
    /// RFC 3339 timestamp of the last flag change.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl MatchRecord {
    pub fn new(entity_key: impl Into<String>, path_a: PathBuf, path_b: PathBuf, matched_by: MatchPass) -> Self {
        Self {
            entity_key: entity_key.into(),
            path_a,
            path_b,
            matched_by,
            stage_pdf: StageStatus::Pending,
            stage_report: StageStatus::Pending,
            updated_at: None,
        }
    }

    pub fn status(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Pdf => self.stage_pdf,
            Stage::Report => self.stage_report,
        }
    }

    pub(crate) fn set_status(&mut self, stage: Stage, status: StageStatus) {
        match stage {
            Stage::Pdf => self.stage_pdf = status,
            Stage::Report => self.stage_report = status,
        }
    }
}

/// The persisted linkage/state record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub version: u32,
    #[serde(default)]
    pub source_a_dir: Option<PathBuf>,
    #[serde(default)]
    pub source_b_dir: Option<PathBuf>,
    #[serde(default)]
    pub template_path: Option<PathBuf>,
    pub created_at: String,
    /// In discovery order; processing follows this order.
    pub records: Vec<MatchRecord>,
    #[serde(default)]
    pub orphans_a: Vec<String>,
    #[serde(default)]
    pub orphans_b: Vec<String>,
}

pub const STATE_VERSION: u32 = 1;

impl PipelineState {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            source_a_dir: None,
            source_b_dir: None,
            template_path: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            records: Vec::new(),
            orphans_a: Vec::new(),
            orphans_b: Vec::new(),
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}
