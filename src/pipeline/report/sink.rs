use std::path::{Path, PathBuf};

use super::headers::HeaderIndex;
use super::{SinkError, REPORT_COLUMN, RESULT_COLUMN, TESTER_COLUMN};
use crate::pipeline::sections::{ComparisonVerdict, Verdict};

/// One report row: who ran it, which entity, and the 0/1 verdicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictRow {
    pub tester: String,
    pub entity: String,
    pub overall: Verdict,
    pub sections: Vec<(String, Verdict)>,
}

impl VerdictRow {
    pub fn from_verdict(tester: &str, entity: &str, verdict: &ComparisonVerdict) -> Self {
        Self {
            tester: tester.to_string(),
            entity: entity.to_string(),
            overall: verdict.overall,
            sections: verdict
                .sections
                .iter()
                .map(|s| (s.key.clone(), s.verdict))
                .collect(),
        }
    }
}

/// Destination of per-entity verdicts. Writing the same entity twice must
/// leave a single row.
pub trait VerdictSink {
    fn upsert(&mut self, row: &VerdictRow) -> Result<(), SinkError>;

    /// Whether a row for `entity` exists.
    fn contains(&self, entity: &str) -> bool;
}

/// CSV report whose columns follow a template header.
pub struct CsvVerdictSink {
    path: PathBuf,
    header: HeaderIndex,
    rows: Vec<Vec<String>>,
    report_col: usize,
}

impl CsvVerdictSink {
    /// Column layout used when no template is configured.
    pub fn synthesized_header(section_keys: &[String]) -> Vec<String> {
        let mut labels = vec![TESTER_COLUMN.to_string(), REPORT_COLUMN.to_string()];
        labels.extend(section_keys.iter().cloned());
        labels.push(RESULT_COLUMN.to_string());
        labels
    }

    /// Open the report at `path` with the given layout. Rows already in the
    /// file are carried over into the layout by header label.
    pub fn open(path: &Path, labels: Vec<String>, section_keys: &[String]) -> Result<Self, SinkError> {
        let header = HeaderIndex::new(labels)?;
        header.require(TESTER_COLUMN)?;
        header.require(RESULT_COLUMN)?;
        for key in section_keys {
            header.require(key)?;
        }
        let report_col = header.require(REPORT_COLUMN)?;

        let rows = if path.exists() {
            load_rows(path, &header)?
        } else {
            Vec::new()
        };

        tracing::debug!(
            report = %path.display(),
            columns = header.len(),
            rows = rows.len(),
            "Report opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            header,
            rows,
            report_col,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell under `label` for `entity`.
    pub fn cell(&self, entity: &str, label: &str) -> Option<&str> {
        let col = self.header.position(label)?;
        self.find_row(entity)
            .and_then(|idx| self.rows[idx].get(col))
            .map(String::as_str)
    }

    /// Row whose Report cell names `entity`, ignoring surrounding whitespace
    /// on both sides.
    fn find_row(&self, entity: &str) -> Option<usize> {
        let entity = entity.trim();
        self.rows
            .iter()
            .position(|row| row.get(self.report_col).is_some_and(|v| v.trim() == entity))
    }

    fn write(&self) -> Result<(), SinkError> {
        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };
        let csv_err = |source| SinkError::Csv {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        {
            let mut writer = csv::WriterBuilder::new().from_writer(&mut tmp);
            writer.write_record(self.header.labels()).map_err(csv_err)?;
            for row in &self.rows {
                writer.write_record(row).map_err(csv_err)?;
            }
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl VerdictSink for CsvVerdictSink {
    fn upsert(&mut self, row: &VerdictRow) -> Result<(), SinkError> {
        let mut cells = match self.find_row(&row.entity) {
            Some(idx) => self.rows[idx].clone(),
            None => vec![String::new(); self.header.len()],
        };

        cells[self.header.require(TESTER_COLUMN)?] = row.tester.clone();
        cells[self.report_col] = row.entity.clone();
        for (key, verdict) in &row.sections {
            if let Some(col) = self.header.position(key) {
                cells[col] = verdict.to_string();
            }
        }
        cells[self.header.require(RESULT_COLUMN)?] = row.overall.to_string();

        match self.find_row(&row.entity) {
            Some(idx) => self.rows[idx] = cells,
            None => self.rows.push(cells),
        }
        self.write()
    }

    fn contains(&self, entity: &str) -> bool {
        self.find_row(entity).is_some()
    }
}

fn load_rows(path: &Path, header: &HeaderIndex) -> Result<Vec<Vec<String>>, SinkError> {
    let csv_err = |source| SinkError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    // Map each existing column to its slot in the current layout.
    let existing = HeaderIndex::new(reader.headers().map_err(csv_err)?.iter().map(str::to_string).collect())?;
    let mapping: Vec<Option<usize>> = existing
        .labels()
        .iter()
        .map(|label| header.position(label))
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let mut cells = vec![String::new(); header.len()];
        for (value, slot) in record.iter().zip(&mapping) {
            if let Some(col) = slot {
                cells[*col] = value.to_string();
            }
        }
        rows.push(cells);
    }
    Ok(rows)
}
