//! Section-level comparison of two exports of the same report.
//!
//! ```text
//! bytes equal? ──yes──▶ all 0
//!      │no
//! extract text ─▶ slice sections ─▶ normalize ─▶ compare ─▶ cascade ─▶ verdict
//! ```

pub mod types;
pub mod extractor;
pub mod normalize;
pub mod verdict;
pub mod comparator;

pub use types::*;
pub use extractor::{Boundary, SectionExtractor, SectionSlice};
pub use verdict::*;
pub use comparator::{apply_cascade, SectionComparator};

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::extraction::ExtractionError;

#[derive(Error, Debug)]
pub enum ComparisonError {
    #[error("Input file could not be verified: {0}")]
    MissingInput(PathBuf),

    #[error("Could not read {path} for binary check: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Data extraction failed for {path}: {source}")]
    Extraction {
        path: PathBuf,
        #[source]
        source: ExtractionError,
    },
}
