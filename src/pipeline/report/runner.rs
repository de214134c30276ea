//! Drives the report stage: every entity whose artifact exists gets compared,
//! written to the report and the evidence log, then checkpointed.

use std::path::PathBuf;

use uuid::Uuid;

use super::evidence::{EvidenceEntry, EvidenceLog};
use super::sink::{VerdictRow, VerdictSink};
use super::SinkError;
use crate::pipeline::sections::{ComparisonError, ComparisonVerdict, SectionComparator};
use crate::pipeline::state::{BatchSummary, MatchRecord, PipelineStateStore, Stage, StepOutcome};
use crate::pipeline::PipelineError;

/// Per-entity result. Failures here are values: the entity stays pending
/// and the batch moves on.
#[derive(Debug)]
pub enum EntityOutcome {
    Recorded(ComparisonVerdict),
    MissingInput(PathBuf),
    ExtractionFailed(String),
}

impl EntityOutcome {
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Recorded(_) => None,
            Self::MissingInput(path) => {
                Some(format!("File paths could not be verified: {}", path.display()))
            }
            Self::ExtractionFailed(e) => Some(format!("Data extraction failed - {e}")),
        }
    }
}

pub struct ReportRunner<'r> {
    tester: &'r str,
    comparator: SectionComparator<'r>,
    sink: &'r mut dyn VerdictSink,
    evidence: &'r EvidenceLog,
}

impl<'r> ReportRunner<'r> {
    pub fn new(
        tester: &'r str,
        comparator: SectionComparator<'r>,
        sink: &'r mut dyn VerdictSink,
        evidence: &'r EvidenceLog,
    ) -> Self {
        Self {
            tester,
            comparator,
            sink,
            evidence,
        }
    }

    /// Compare one pair and write its verdict. Only sink I/O is an error.
    pub fn process(&mut self, record: &MatchRecord) -> Result<EntityOutcome, SinkError> {
        let entity = record.entity_key.as_str();
        tracing::info!(entity, "Processing");

        let outcome = match self.comparator.compare_files(&record.path_a, &record.path_b) {
            Ok(verdict) => EntityOutcome::Recorded(verdict),
            Err(ComparisonError::MissingInput(path)) => EntityOutcome::MissingInput(path),
            Err(other) => EntityOutcome::ExtractionFailed(other.to_string()),
        };

        match &outcome {
            EntityOutcome::Recorded(verdict) => {
                self.sink
                    .upsert(&VerdictRow::from_verdict(self.tester, entity, verdict))?;
                self.evidence.record(entity, &EvidenceEntry::Verdict(verdict))?;
                tracing::info!(
                    entity,
                    overall = verdict.overall.as_u8(),
                    binary = verdict.is_binary_match(),
                    "Verdict recorded"
                );
            }
            failed => {
                let reason = failed.failure_reason().unwrap_or_default();
                self.evidence.record(entity, &EvidenceEntry::Failure(&reason))?;
            }
        }

        Ok(outcome)
    }

    /// Process up to `limit` entities ready for the report stage.
    pub fn run(
        &mut self,
        store: &mut PipelineStateStore,
        limit: usize,
        run_id: Uuid,
    ) -> Result<BatchSummary, PipelineError> {
        self.evidence.begin_run(run_id)?;

        store.apply_batch(Stage::Pdf, Stage::Report, limit, |record| {
            let outcome = self.process(record)?;
            Ok::<_, PipelineError>(match outcome.failure_reason() {
                None => StepOutcome::Completed,
                Some(reason) => StepOutcome::Failed(reason),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::pipeline::extraction::DocumentTextExtractor;
    use crate::pipeline::linkage::MatchPass;
    use crate::pipeline::report::CsvVerdictSink;
    use crate::pipeline::sections::{Section, SectionPolicy};
    use crate::pipeline::state::{PipelineState, StageStatus};

    fn sections() -> Vec<Section> {
        let summary = SectionPolicy {
            required: false,
            ..SectionPolicy::default()
        };
        vec![
            Section::new("Summary Page", "Year Over Year", Some("Calls by Site"), summary),
            Section::new("Site Page", "Calls by Site", None, SectionPolicy::default()),
        ]
    }

    fn keys() -> Vec<String> {
        sections().into_iter().map(|s| s.key).collect()
    }

    const BASE: &str = "Year Over Year\nTotal calls 2025 1200 2026 1350\n\
                        Calls by Site\nNorth 410 South 520 East 420\n";

    struct Fixture {
        dir: tempfile::TempDir,
        store: PipelineStateStore,
    }

    fn fixture(pairs: &[(&str, Option<&[u8]>, Option<&[u8]>)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let hs = dir.path().join("hs");
        let sf = dir.path().join("sf");
        std::fs::create_dir_all(&hs).unwrap();
        std::fs::create_dir_all(&sf).unwrap();

        let mut state = PipelineState::new();
        for (key, a, b) in pairs {
            let path_a = hs.join(format!("{key}_2026-01-05.txt"));
            let path_b = sf.join(format!("{key}_2026-01-06.txt"));
            if let Some(bytes) = a {
                std::fs::write(&path_a, bytes).unwrap();
            }
            if let Some(bytes) = b {
                std::fs::write(&path_b, bytes).unwrap();
            }
            let mut record = MatchRecord::new(*key, path_a, path_b, MatchPass::Normalized);
            record.stage_pdf = StageStatus::Completed;
            state.records.push(record);
        }

        let store = PipelineStateStore::create(&dir.path().join("targets.json"), state).unwrap();
        Fixture { dir, store }
    }

    fn open_sink(dir: &Path) -> CsvVerdictSink {
        CsvVerdictSink::open(
            &dir.join("report.csv"),
            CsvVerdictSink::synthesized_header(&keys()),
            &keys(),
        )
        .unwrap()
    }

    #[test]
    fn batch_records_verdicts_and_skips_failures() {
        let altered = BASE.replace("North 410", "North 411");
        let mut fx = fixture(&[
            ("Acme", Some(BASE.as_bytes()), Some(BASE.as_bytes())),
            ("Globex", Some(BASE.as_bytes()), Some(altered.as_bytes())),
            ("Initech", Some(BASE.as_bytes()), None),
            ("Umbrella", Some(BASE.as_bytes()), Some(&b"\x00\x01binary\x02"[..])),
        ]);

        let sections = sections();
        let source = DocumentTextExtractor;
        let comparator = SectionComparator::new(&sections, "Summary Page", &source).unwrap();
        let mut sink = open_sink(fx.dir.path());
        let evidence = EvidenceLog::new(&fx.dir.path().join("evidence.md"));

        let summary = {
            let mut runner = ReportRunner::new("QA Automation", comparator, &mut sink, &evidence);
            runner.run(&mut fx.store, 10, Uuid::new_v4()).unwrap()
        };

        assert_eq!(summary.completed, vec!["Acme", "Globex"]);
        let failed: Vec<&str> = summary.failed.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(failed, vec!["Initech", "Umbrella"]);

        assert_eq!(sink.row_count(), 2);
        assert_eq!(sink.cell("Acme", "Test Result"), Some("0"));
        assert_eq!(sink.cell("Globex", "Site Page"), Some("1"));
        assert_eq!(sink.cell("Globex", "Summary Page"), Some("1"));
        assert_eq!(sink.cell("Globex", "Test Result"), Some("1"));

        let log = std::fs::read_to_string(evidence.path()).unwrap();
        assert!(log.contains("### Client: Acme\n- **Overall Result: 0** (Verified Binary Match)"));
        assert!(log.contains("- **Summary Page**: 1 (Inferred failure (detail section mismatch))"));
        assert!(log.contains("### Client: Initech\n- Error: File paths could not be verified"));
        assert!(log.contains("### Client: Umbrella\n- Error: Data extraction failed"));

        let reloaded = PipelineStateStore::open(fx.store.path()).unwrap();
        let ready: Vec<&str> = reloaded
            .select_ready(Stage::Pdf, Stage::Report)
            .iter()
            .map(|r| r.entity_key.as_str())
            .collect();
        assert_eq!(ready, vec!["Initech", "Umbrella"]);
    }

    #[test]
    fn rerun_after_completion_is_a_noop() {
        let mut fx = fixture(&[("Acme", Some(BASE.as_bytes()), Some(BASE.as_bytes()))]);
        let sections = sections();
        let source = DocumentTextExtractor;
        let evidence = EvidenceLog::new(&fx.dir.path().join("evidence.md"));
        let mut sink = open_sink(fx.dir.path());

        for _ in 0..2 {
            let comparator = SectionComparator::new(&sections, "Summary Page", &source).unwrap();
            let mut runner = ReportRunner::new("QA Automation", comparator, &mut sink, &evidence);
            runner.run(&mut fx.store, 10, Uuid::new_v4()).unwrap();
        }

        assert_eq!(sink.row_count(), 1);
        let log = std::fs::read_to_string(evidence.path()).unwrap();
        assert_eq!(log.matches("### Client: Acme").count(), 1);
    }

    #[test]
    fn limit_bounds_the_batch() {
        let mut fx = fixture(&[
            ("A", Some(BASE.as_bytes()), Some(BASE.as_bytes())),
            ("B", Some(BASE.as_bytes()), Some(BASE.as_bytes())),
            ("C", Some(BASE.as_bytes()), Some(BASE.as_bytes())),
        ]);
        let sections = sections();
        let source = DocumentTextExtractor;
        let comparator = SectionComparator::new(&sections, "Summary Page", &source).unwrap();
        let evidence = EvidenceLog::new(&fx.dir.path().join("evidence.md"));
        let mut sink = open_sink(fx.dir.path());

        let summary = ReportRunner::new("QA Automation", comparator, &mut sink, &evidence)
            .run(&mut fx.store, 2, Uuid::new_v4())
            .unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.remaining(), 1);
        assert!(!sink.contains("C"));
    }
}
