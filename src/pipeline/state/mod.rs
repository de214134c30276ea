//! Per-entity pipeline progress, persisted between runs.
//!
//! Two stages per entity, each `pending → completed`. The only way back is
//! reconciliation against the artifact a stage claims to have produced.

pub mod types;
pub mod reconcile;
pub mod store;

pub use types::*;
pub use reconcile::reconcile_flag;
pub use store::{BatchSummary, PipelineStateStore, StepOutcome, SyncMerge};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("I/O error on state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported state file version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Cannot complete {stage} for {entity}: {prerequisite} is still pending")]
    PrerequisitePending {
        entity: String,
        stage: Stage,
        prerequisite: Stage,
    },

    #[error("Duplicate entity key in state file: {0}")]
    DuplicateEntity(String),
}
