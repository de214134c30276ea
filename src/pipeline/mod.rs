pub mod linkage;
pub mod extraction;
pub mod sections;
pub mod state;
pub mod report;

use thiserror::Error;

use crate::config::ConfigError;

/// Anything that stops a command. Per-entity comparison failures never
/// surface here; they are recorded and the entity stays pending.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Linkage(#[from] linkage::LinkageError),

    #[error(transparent)]
    State(#[from] state::StateError),

    #[error(transparent)]
    Sink(#[from] report::SinkError),

    #[error(transparent)]
    Comparison(#[from] sections::ComparisonError),

    #[error("Invalid section marker: {0}")]
    InvalidSections(#[from] regex::Error),
}
