use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use super::SinkError;
use crate::config::TemplateConfig;

/// Header label → column position, matched on normalized labels so that
/// `"Report "` in a template resolves `"Report"`.
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    labels: Vec<String>,
    positions: HashMap<String, usize>,
}

fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl HeaderIndex {
    pub fn new(labels: Vec<String>) -> Result<Self, SinkError> {
        let mut positions = HashMap::new();
        for (idx, label) in labels.iter().enumerate() {
            let key = normalize_label(label);
            if key.is_empty() {
                continue;
            }
            if positions.insert(key, idx).is_some() {
                return Err(SinkError::DuplicateColumn(label.trim().to_string()));
            }
        }
        Ok(Self { labels, positions })
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.positions.get(&normalize_label(label)).copied()
    }

    /// Position of a column the report cannot do without.
    pub fn require(&self, label: &str) -> Result<usize, SinkError> {
        self.position(label)
            .ok_or_else(|| SinkError::MissingColumn(label.to_string()))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Read the header labels of a report template. `.csv` templates are read
/// with the csv crate, anything else as a workbook via calamine.
pub fn load_template_header(template: &TemplateConfig) -> Result<Vec<String>, SinkError> {
    if template.header_row == 0 {
        return Err(SinkError::NoHeaderRow {
            path: template.path.clone(),
            row: 0,
        });
    }

    let is_csv = template
        .path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let labels = if is_csv {
        csv_header(&template.path, template.header_row)?
    } else {
        workbook_header(&template.path, &template.sheet, template.header_row)?
    };

    let labels = trim_trailing_empty(labels);
    if labels.is_empty() {
        return Err(SinkError::NoHeaderRow {
            path: template.path.clone(),
            row: template.header_row,
        });
    }

    tracing::debug!(
        template = %template.path.display(),
        columns = labels.len(),
        "Template header loaded"
    );
    Ok(labels)
}

fn csv_header(path: &Path, header_row: usize) -> Result<Vec<String>, SinkError> {
    let csv_err = |source| SinkError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    match reader.records().nth(header_row - 1) {
        Some(record) => Ok(record.map_err(csv_err)?.iter().map(str::to_string).collect()),
        None => Ok(Vec::new()),
    }
}

fn workbook_header(path: &Path, sheet: &str, header_row: usize) -> Result<Vec<String>, SinkError> {
    let template_err = |source| SinkError::Template {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(template_err)?;
    let range = workbook.worksheet_range(sheet).map_err(template_err)?;

    // Range coordinates are absolute; rows() starts at the first used cell.
    let Some((start_row, start_col)) = range.start() else {
        return Ok(Vec::new());
    };
    let target = (header_row - 1) as u32;
    if target < start_row {
        return Ok(Vec::new());
    }

    let Some(row) = range.rows().nth((target - start_row) as usize) else {
        return Ok(Vec::new());
    };

    let mut labels = vec![String::new(); start_col as usize];
    labels.extend(row.iter().map(|cell| match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }));
    Ok(labels)
}

fn trim_trailing_empty(mut labels: Vec<String>) -> Vec<String> {
    while labels.last().is_some_and(|l| l.trim().is_empty()) {
        labels.pop();
    }
    labels
}
