use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::sections::{Section, SectionPolicy};

/// Application-level constants
pub const APP_NAME: &str = "DocPair";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// File names written under the output directory.
pub const STATE_FILE_NAME: &str = "targets.json";
pub const REPORT_FILE_NAME: &str = "QA_ANALYTICS_REPORT_FINAL.csv";
pub const EVIDENCE_FILE_NAME: &str = "QA_TECHNICAL_EVIDENCE.md";

/// Get the application data directory
/// ~/DocPair/ on all platforms. Falls back to the current directory when
/// no home directory can be resolved.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the persisted linkage/state record.
pub fn default_state_path() -> PathBuf {
    app_data_dir().join(STATE_FILE_NAME)
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "docpair=info,docpair_lib=info"
}

/// Filter used with `--verbose` when `RUST_LOG` is not set.
pub fn verbose_log_filter() -> &'static str {
    "docpair=debug,docpair_lib=debug"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Everything a run needs, passed explicitly into each component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Written to the `Tester` column of every verdict row.
    pub tester_name: String,
    /// Regex locating the date-like suffix appended by export tooling.
    pub year_token_pattern: String,
    /// Only files with this extension enter the matcher pools.
    pub file_extension: String,
    pub sections: Vec<Section>,
    /// Key of the section that aggregates all the others.
    pub summary_section: String,
    /// Where the external renderer deposits its artifacts.
    pub artifact_dir: Option<PathBuf>,
    /// Artifact file name; `{entity}` is replaced by the entity key.
    pub artifact_pattern: String,
    pub template: Option<TemplateConfig>,
    /// Directory receiving the verdict table and the evidence log.
    pub output_dir: Option<PathBuf>,
}

/// Report template whose header row defines the verdict table columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub path: PathBuf,
    /// Worksheet name, only used for .xlsx templates.
    #[serde(default = "default_sheet_name")]
    pub sheet: String,
    /// 1-based row holding the column labels.
    #[serde(default = "default_header_row")]
    pub header_row: usize,
}

impl TemplateConfig {
    /// Template at `path` with the default sheet and header row.
    pub fn at(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            sheet: default_sheet_name(),
            header_row: default_header_row(),
        }
    }
}

fn default_sheet_name() -> String {
    "QA Report Test Tracker".to_string()
}

fn default_header_row() -> usize {
    3
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tester_name: "QA Automation".to_string(),
            year_token_pattern: r"_20\d{2}".to_string(),
            file_extension: "pdf".to_string(),
            sections: default_sections(),
            summary_section: "Summary Page".to_string(),
            artifact_dir: None,
            artifact_pattern: "{entity}.pdf".to_string(),
            template: None,
            output_dir: None,
        }
    }
}

/// Marker vocabulary of the call-volume reports. Deployments whose exports
/// say "Calls by Site" instead of "Calls by Agency" override this in JSON.
pub fn default_sections() -> Vec<Section> {
    let detail = SectionPolicy::default();
    let summary = SectionPolicy {
        required: false,
        ..SectionPolicy::default()
    };

    vec![
        Section::new(
            "Summary Page",
            "Year Over Year Comparison of Calls",
            Some("Calls by Agency"),
            summary,
        ),
        Section::new("Site Page", "Calls by Agency", Some("Calls by Day of Week"), detail.clone()),
        Section::new(
            "Day of Week",
            "Calls by Day of Week",
            Some("Calls by Hour of Day"),
            detail.clone(),
        ),
        Section::new("Hour of Day", "Calls by Hour of Day", Some("Calls by Outcome"), detail.clone()),
        Section::new("Outcome", "Calls by Outcome", Some("Calls by Diagnosis"), detail.clone()),
        Section::new("Diagnosis", "Calls by Diagnosis", None, detail),
    ]
}

impl RunConfig {
    /// Load a config file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RunConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sections.is_empty() {
            return Err(ConfigError::Invalid("at least one section is required".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for section in &self.sections {
            if section.key.trim().is_empty() || section.start_marker.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "section '{}' needs a key and a start marker",
                    section.key
                )));
            }
            if !seen.insert(section.key.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate section key '{}'",
                    section.key
                )));
            }
        }

        if !self.sections.iter().any(|s| s.key == self.summary_section) {
            return Err(ConfigError::Invalid(format!(
                "summary section '{}' is not among the configured sections",
                self.summary_section
            )));
        }

        regex::Regex::new(&self.year_token_pattern).map_err(|e| {
            ConfigError::Invalid(format!("year_token_pattern: {e}"))
        })?;

        if !self.artifact_pattern.contains("{entity}") {
            return Err(ConfigError::Invalid(
                "artifact_pattern must contain {entity}".into(),
            ));
        }

        Ok(())
    }

    /// Output directory, next to the template when none is configured.
    pub fn resolve_output_dir(&self, state_path: &Path) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        let base = self
            .template
            .as_ref()
            .and_then(|t| t.path.parent().map(Path::to_path_buf))
            .or_else(|| state_path.parent().map(Path::to_path_buf))
            .unwrap_or_else(app_data_dir);
        base.join("QA_ANALYTICS_RESULTS")
    }

    /// Expected renderer artifact for an entity, if an artifact dir is set.
    /// Keys that kept their source extension are substituted without it.
    pub fn artifact_path(&self, entity_key: &str) -> Option<PathBuf> {
        let stem = self.artifact_stem(entity_key);
        self.artifact_dir
            .as_ref()
            .map(|dir| dir.join(self.artifact_pattern.replace("{entity}", stem)))
    }

    fn artifact_stem<'a>(&self, entity_key: &'a str) -> &'a str {
        let suffix = format!(".{}", self.file_extension);
        let Some(cut) = entity_key.len().checked_sub(suffix.len()) else {
            return entity_key;
        };
        match entity_key.get(cut..) {
            Some(tail) if cut > 0 && tail.eq_ignore_ascii_case(&suffix) => &entity_key[..cut],
            _ => entity_key,
        }
    }
}
