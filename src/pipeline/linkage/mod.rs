//! Record linkage between the two document collections.
//!
//! ```text
//! pool A ─┐                                  ┌─ pairs
//!         ├─ exact pass ─ normalized pass ───┼─ orphans A
//! pool B ─┘                                  └─ orphans B
//! ```

pub mod normalize;
pub mod matcher;
pub mod pool;

pub use normalize::NameNormalizer;
pub use matcher::{AmbiguousKey, LinkedPair, MatchOutcome, MatchPass, Matcher};
pub use pool::collect_identifiers;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkageError {
    #[error("Invalid year token pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Cannot list source directory {path}: {source}")]
    SourceDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
