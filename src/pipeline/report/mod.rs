//! Verdict output: the tabular report keyed by template header labels and
//! the append-only Markdown evidence log.

pub mod headers;
pub mod sink;
pub mod evidence;
pub mod runner;

pub use headers::{load_template_header, HeaderIndex};
pub use sink::{CsvVerdictSink, VerdictRow, VerdictSink};
pub use evidence::{EvidenceEntry, EvidenceLog};
pub use runner::{EntityOutcome, ReportRunner};

use std::path::PathBuf;

use thiserror::Error;

/// Column labels every report layout must carry besides the section keys.
pub const TESTER_COLUMN: &str = "Tester";
pub const REPORT_COLUMN: &str = "Report";
pub const RESULT_COLUMN: &str = "Test Result";

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Cannot read template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("Template {path} has no header at row {row}")]
    NoHeaderRow { path: PathBuf, row: usize },

    #[error("Report layout has no '{0}' column")]
    MissingColumn(String),

    #[error("Report layout has duplicate column '{0}'")]
    DuplicateColumn(String),
}
