use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::SinkError;
use crate::pipeline::sections::ComparisonVerdict;

/// What gets logged for one entity.
#[derive(Debug)]
pub enum EvidenceEntry<'a> {
    Verdict(&'a ComparisonVerdict),
    Failure(&'a str),
}

/// Append-only Markdown log explaining every verdict.
#[derive(Debug, Clone)]
pub struct EvidenceLog {
    path: PathBuf,
}

impl EvidenceLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the heading of a new run. The file title is written once.
    pub fn begin_run(&self, run_id: Uuid) -> Result<(), SinkError> {
        let mut text = String::new();
        if !self.path.exists() {
            text.push_str("# Analysis Evidence Log\n");
        }
        text.push_str(&format!(
            "\n## Run {run_id} - {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M")
        ));
        self.append(&text)
    }

    pub fn record(&self, entity: &str, entry: &EvidenceEntry<'_>) -> Result<(), SinkError> {
        self.append(&render_entry(entity, entry))
    }

    fn append(&self, text: &str) -> Result<(), SinkError> {
        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(text.as_bytes()).map_err(io_err)
    }
}

/// Markdown block for one entity.
pub fn render_entry(entity: &str, entry: &EvidenceEntry<'_>) -> String {
    let mut lines = vec![format!("\n### Client: {entity}")];

    match entry {
        EvidenceEntry::Failure(message) => {
            lines.push(format!("- Error: {message}"));
        }
        EvidenceEntry::Verdict(verdict) if verdict.is_binary_match() => {
            lines.push(format!(
                "- **Overall Result: {}** (Verified Binary Match)",
                verdict.overall
            ));
        }
        EvidenceEntry::Verdict(verdict) => {
            for section in &verdict.sections {
                lines.push(format!(
                    "- **{}**: {} ({})",
                    section.key, section.verdict, section.reason
                ));
            }
            lines.push(format!("- **Analytical Verdict**: {}", verdict.overall));
        }
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
