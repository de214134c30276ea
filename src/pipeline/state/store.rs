//! JSON-file state store with atomic checkpoints.
//!
//! Every mutating operation that changes a flag rewrites the file through a
//! temp file in the same directory followed by a rename, so a crash leaves
//! either the old or the new state on disk, never a torn one.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::reconcile::reconcile_flag;
use super::types::*;
use super::StateError;

/// Result of one unit of work inside [`PipelineStateStore::apply_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// Entity-level failure; the entity stays pending for a later run.
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Entities ready when the batch started.
    pub ready: usize,
    pub attempted: usize,
    pub completed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchSummary {
    /// Ready entities still pending after the batch.
    pub fn remaining(&self) -> usize {
        self.ready - self.completed.len()
    }
}

/// What a sync changed in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncMerge {
    pub added: usize,
    /// Keys already tracked with different files; the new files became orphans.
    pub conflicts: Vec<String>,
}

pub struct PipelineStateStore {
    path: PathBuf,
    state: PipelineState,
}

impl PipelineStateStore {
    /// Start a new store at `path` and write it immediately.
    pub fn create(path: &Path, state: PipelineState) -> Result<Self, StateError> {
        validate(&state)?;
        let store = Self {
            path: path.to_path_buf(),
            state,
        };
        store.save()?;
        Ok(store)
    }

    /// Load an existing store.
    pub fn open(path: &Path) -> Result<Self, StateError> {
        let raw = std::fs::read_to_string(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let state: PipelineState = serde_json::from_str(&raw)?;
        validate(&state)?;

        tracing::debug!(path = %path.display(), entities = state.records.len(), "State loaded");
        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    /// Load the store at `path`, or start an empty one if there is none yet.
    pub fn open_or_new(path: &Path) -> Result<Self, StateError> {
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path, PipelineState::new())
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn records(&self) -> &[MatchRecord] {
        &self.state.records
    }

    pub fn get(&self, entity: &str) -> Option<&MatchRecord> {
        self.state.records.iter().find(|r| r.entity_key == entity)
    }

    /// Atomically write the current state to disk.
    pub fn save(&self) -> Result<(), StateError> {
        let io_err = |source| StateError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let json = serde_json::to_vec_pretty(&self.state)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        Ok(())
    }

    /// Record sync metadata and add newly matched entities. Existing records
    /// are never replaced or removed; orphan lists reflect the latest sync.
    ///
    /// A pair linked under an already tracked key but with different files
    /// is not merged: its differing files are added to the orphan lists so
    /// they stay visible for review.
    pub fn merge_sync(
        &mut self,
        source_a_dir: &Path,
        source_b_dir: &Path,
        template_path: Option<&Path>,
        records: Vec<MatchRecord>,
        orphans_a: Vec<String>,
        orphans_b: Vec<String>,
    ) -> Result<SyncMerge, StateError> {
        self.state.orphans_a = orphans_a;
        self.state.orphans_b = orphans_b;

        let mut merge = SyncMerge::default();
        for record in records {
            let Some(tracked) = self.get(&record.entity_key) else {
                self.state.records.push(record);
                merge.added += 1;
                continue;
            };

            let stale_a = tracked.path_a != record.path_a;
            let stale_b = tracked.path_b != record.path_b;
            if !stale_a && !stale_b {
                tracing::debug!(entity = %record.entity_key, "Entity already tracked");
                continue;
            }

            tracing::warn!(
                entity = %record.entity_key,
                tracked_a = %tracked.path_a.display(),
                tracked_b = %tracked.path_b.display(),
                incoming_a = %record.path_a.display(),
                incoming_b = %record.path_b.display(),
                "Entity already tracked with other files, new files left as orphans"
            );
            if stale_a {
                self.state.orphans_a.push(identifier_of(&record.path_a));
            }
            if stale_b {
                self.state.orphans_b.push(identifier_of(&record.path_b));
            }
            merge.conflicts.push(record.entity_key);
        }

        self.state.source_a_dir = Some(source_a_dir.to_path_buf());
        self.state.source_b_dir = Some(source_b_dir.to_path_buf());
        if let Some(template) = template_path {
            self.state.template_path = Some(template.to_path_buf());
        }

        self.save()?;
        Ok(merge)
    }

    /// Transition `stage` to completed. Returns whether anything changed;
    /// re-marking a completed stage is a no-op.
    pub fn mark_completed(&mut self, entity: &str, stage: Stage) -> Result<bool, StateError> {
        let record = self.record_mut(entity)?;

        if record.status(stage).is_completed() {
            return Ok(false);
        }
        if let Some(prerequisite) = stage.prerequisite() {
            if !record.status(prerequisite).is_completed() {
                return Err(StateError::PrerequisitePending {
                    entity: entity.to_string(),
                    stage,
                    prerequisite,
                });
            }
        }

        record.set_status(stage, StageStatus::Completed);
        record.updated_at = Some(Utc::now().to_rfc3339());
        self.save()?;

        tracing::debug!(entity, stage = stage.as_str(), "Stage completed");
        Ok(true)
    }

    /// Check a completed flag against its artifact and demote it when the
    /// artifact is gone. Dependent stages are demoted with it. Returns
    /// whether the entity was demoted.
    pub fn reconcile_physical<F>(
        &mut self,
        entity: &str,
        stage: Stage,
        exists_fn: F,
    ) -> Result<bool, StateError>
    where
        F: Fn(&MatchRecord) -> bool,
    {
        let record = self.record_mut(entity)?;
        if !demote_if_missing(record, stage, &exists_fn) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// [`reconcile_physical`](Self::reconcile_physical) over every entity,
    /// with a single checkpoint. Returns the demoted entity keys.
    pub fn reconcile_all<F>(&mut self, stage: Stage, exists_fn: F) -> Result<Vec<String>, StateError>
    where
        F: Fn(&MatchRecord) -> bool,
    {
        let demoted: Vec<String> = self
            .state
            .records
            .iter_mut()
            .filter_map(|record| {
                demote_if_missing(record, stage, &exists_fn).then(|| record.entity_key.clone())
            })
            .collect();

        if !demoted.is_empty() {
            self.save()?;
        }
        Ok(demoted)
    }

    /// Entities whose `prerequisite` is completed and `target` still pending,
    /// in discovery order.
    pub fn select_ready(&self, prerequisite: Stage, target: Stage) -> Vec<&MatchRecord> {
        self.state
            .records
            .iter()
            .filter(|r| r.status(prerequisite).is_completed() && !r.status(target).is_completed())
            .collect()
    }

    /// Entities with `stage` pending.
    pub fn pending(&self, stage: Stage) -> Vec<&MatchRecord> {
        self.state
            .records
            .iter()
            .filter(|r| !r.status(stage).is_completed())
            .collect()
    }

    /// Run `work` on at most `limit` ready entities, checkpointing after each
    /// success. Entity failures are recorded and leave the entity pending;
    /// an `Err` from `work` stops the batch with prior successes persisted.
    pub fn apply_batch<F, E>(
        &mut self,
        prerequisite: Stage,
        target: Stage,
        limit: usize,
        mut work: F,
    ) -> Result<BatchSummary, E>
    where
        F: FnMut(&MatchRecord) -> Result<StepOutcome, E>,
        E: From<StateError>,
    {
        let ready = self.select_ready(prerequisite, target);
        let mut summary = BatchSummary {
            ready: ready.len(),
            ..BatchSummary::default()
        };
        let batch: Vec<MatchRecord> = ready.into_iter().take(limit).cloned().collect();

        tracing::info!(
            ready = summary.ready,
            batch = batch.len(),
            stage = target.as_str(),
            "Starting batch"
        );

        for record in &batch {
            summary.attempted += 1;
            match work(record)? {
                StepOutcome::Completed => {
                    self.mark_completed(&record.entity_key, target)?;
                    summary.completed.push(record.entity_key.clone());
                }
                StepOutcome::Failed(reason) => {
                    tracing::warn!(entity = %record.entity_key, %reason, "Entity failed, left pending");
                    summary.failed.push((record.entity_key.clone(), reason));
                }
            }
        }

        Ok(summary)
    }

    fn record_mut(&mut self, entity: &str) -> Result<&mut MatchRecord, StateError> {
        self.state
            .records
            .iter_mut()
            .find(|r| r.entity_key == entity)
            .ok_or_else(|| StateError::UnknownEntity(entity.to_string()))
    }
}

fn demote_if_missing<F>(record: &mut MatchRecord, stage: Stage, exists_fn: &F) -> bool
where
    F: Fn(&MatchRecord) -> bool,
{
    let current = record.status(stage);
    if !current.is_completed() {
        return false;
    }

    let reconciled = reconcile_flag(current, exists_fn(record));
    if reconciled == current {
        return false;
    }

    tracing::info!(
        entity = %record.entity_key,
        stage = stage.as_str(),
        "Artifact missing, flag demoted to pending"
    );
    record.set_status(stage, reconciled);
    for &dependent in stage.dependents() {
        record.set_status(dependent, StageStatus::Pending);
    }
    record.updated_at = Some(Utc::now().to_rfc3339());
    true
}

/// File name of a matched path, as listed in the orphan sets.
fn identifier_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn validate(state: &PipelineState) -> Result<(), StateError> {
    if state.version != STATE_VERSION {
        return Err(StateError::Version {
            found: state.version,
            expected: STATE_VERSION,
        });
    }

    let mut seen = HashSet::new();
    for record in &state.records {
        if !seen.insert(record.entity_key.as_str()) {
            return Err(StateError::DuplicateEntity(record.entity_key.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::panic::AssertUnwindSafe;

    use super::*;
    use crate::pipeline::linkage::MatchPass;

    fn record(key: &str) -> MatchRecord {
        MatchRecord::new(
            key,
            PathBuf::from(format!("/hs/{key}.pdf")),
            PathBuf::from(format!("/sf/{key}.pdf")),
            MatchPass::Exact,
        )
    }

    fn store_with(dir: &Path, keys: &[&str]) -> PipelineStateStore {
        let mut state = PipelineState::new();
        state.records = keys.iter().map(|k| record(k)).collect();
        PipelineStateStore::create(&dir.join("targets.json"), state).unwrap()
    }

    fn completed(store: &PipelineStateStore, stage: Stage) -> Vec<String> {
        store
            .records()
            .iter()
            .filter(|r| r.status(stage).is_completed())
            .map(|r| r.entity_key.clone())
            .collect()
    }

    #[test]
    fn round_trip_preserves_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Acme", "Globex", "Initech"]);
        store.state.orphans_a = vec!["Stray_2026.pdf".into()];
        store.save().unwrap();

        let before = PipelineStateStore::open(store.path()).unwrap().state().clone();
        store.mark_completed("Globex", Stage::Pdf).unwrap();
        let after = PipelineStateStore::open(store.path()).unwrap().state().clone();

        assert_eq!(before.records.len(), after.records.len());
        for (b, a) in before.records.iter().zip(&after.records) {
            if b.entity_key == "Globex" {
                assert_eq!(a.stage_pdf, StageStatus::Completed);
                assert_eq!(a.path_a, b.path_a);
            } else {
                assert_eq!(a, b);
            }
        }
        assert_eq!(after.orphans_a, before.orphans_a);
    }

    #[test]
    fn mark_completed_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Acme"]);

        assert!(store.mark_completed("Acme", Stage::Pdf).unwrap());
        assert!(!store.mark_completed("Acme", Stage::Pdf).unwrap());
        assert_eq!(completed(&store, Stage::Pdf), vec!["Acme"]);
    }

    #[test]
    fn report_requires_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Acme"]);

        let err = store.mark_completed("Acme", Stage::Report).unwrap_err();
        assert!(matches!(err, StateError::PrerequisitePending { .. }));
        assert_eq!(store.get("Acme").unwrap().stage_report, StageStatus::Pending);
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Acme"]);
        assert!(matches!(
            store.mark_completed("Nobody", Stage::Pdf),
            Err(StateError::UnknownEntity(_))
        ));
    }

    #[test]
    fn reconcile_demotes_only_when_artifact_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Acme", "Globex"]);
        store.mark_completed("Acme", Stage::Pdf).unwrap();
        store.mark_completed("Globex", Stage::Pdf).unwrap();

        assert!(!store.reconcile_physical("Acme", Stage::Pdf, |_| true).unwrap());
        assert!(store.reconcile_physical("Globex", Stage::Pdf, |_| false).unwrap());

        let reloaded = PipelineStateStore::open(store.path()).unwrap();
        assert_eq!(completed(&reloaded, Stage::Pdf), vec!["Acme"]);
    }

    #[test]
    fn reconcile_never_promotes() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Acme"]);

        assert!(!store.reconcile_physical("Acme", Stage::Pdf, |_| true).unwrap());
        assert_eq!(store.get("Acme").unwrap().stage_pdf, StageStatus::Pending);
    }

    #[test]
    fn demoting_pdf_demotes_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Acme"]);
        store.mark_completed("Acme", Stage::Pdf).unwrap();
        store.mark_completed("Acme", Stage::Report).unwrap();

        let demoted = store.reconcile_all(Stage::Pdf, |_| false).unwrap();
        assert_eq!(demoted, vec!["Acme"]);
        let acme = store.get("Acme").unwrap();
        assert_eq!(acme.stage_pdf, StageStatus::Pending);
        assert_eq!(acme.stage_report, StageStatus::Pending);
    }

    #[test]
    fn demoting_report_keeps_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Acme"]);
        store.mark_completed("Acme", Stage::Pdf).unwrap();
        store.mark_completed("Acme", Stage::Report).unwrap();

        assert!(store.reconcile_physical("Acme", Stage::Report, |_| false).unwrap());
        let acme = store.get("Acme").unwrap();
        assert_eq!(acme.stage_pdf, StageStatus::Completed);
        assert_eq!(acme.stage_report, StageStatus::Pending);
    }

    #[test]
    fn select_ready_follows_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Zeta", "Acme", "Mid"]);
        store.mark_completed("Mid", Stage::Pdf).unwrap();
        store.mark_completed("Zeta", Stage::Pdf).unwrap();
        store.mark_completed("Zeta", Stage::Report).unwrap();
        store.mark_completed("Acme", Stage::Pdf).unwrap();

        let ready: Vec<&str> = store
            .select_ready(Stage::Pdf, Stage::Report)
            .iter()
            .map(|r| r.entity_key.as_str())
            .collect();
        assert_eq!(ready, vec!["Acme", "Mid"]);
    }

    #[test]
    fn apply_batch_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let keys = ["A", "B", "C", "D", "E"];
        let mut store = store_with(dir.path(), &keys);
        for k in keys {
            store.mark_completed(k, Stage::Pdf).unwrap();
        }

        let summary = store
            .apply_batch(Stage::Pdf, Stage::Report, 3, |_| Ok::<_, StateError>(StepOutcome::Completed))
            .unwrap();

        assert_eq!(summary.ready, 5);
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.completed, vec!["A", "B", "C"]);
        assert_eq!(summary.remaining(), 2);
        assert_eq!(store.select_ready(Stage::Pdf, Stage::Report).len(), 2);
    }

    #[test]
    fn apply_batch_failures_stay_pending() {
        let dir = tempfile::tempdir().unwrap();
        let keys = ["A", "B", "C"];
        let mut store = store_with(dir.path(), &keys);
        for k in keys {
            store.mark_completed(k, Stage::Pdf).unwrap();
        }

        let summary = store
            .apply_batch(Stage::Pdf, Stage::Report, 10, |r| {
                Ok::<_, StateError>(if r.entity_key == "B" {
                    StepOutcome::Failed("extraction error".into())
                } else {
                    StepOutcome::Completed
                })
            })
            .unwrap();

        assert_eq!(summary.completed, vec!["A", "C"]);
        assert_eq!(summary.failed, vec![("B".to_string(), "extraction error".to_string())]);
        assert_eq!(completed(&store, Stage::Report), vec!["A", "C"]);
    }

    #[test]
    fn crash_mid_batch_keeps_completed_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let keys = ["A", "B", "C", "D", "E", "F"];
        let mut store = store_with(dir.path(), &keys);
        for k in keys {
            store.mark_completed(k, Stage::Pdf).unwrap();
        }
        let path = store.path().to_path_buf();

        let crash_after = 2;
        let mut calls = 0;
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            store.apply_batch(Stage::Pdf, Stage::Report, 10, |_| {
                calls += 1;
                if calls > crash_after {
                    panic!("simulated crash");
                }
                Ok::<_, StateError>(StepOutcome::Completed)
            })
        }));
        assert!(result.is_err());

        let reloaded = PipelineStateStore::open(&path).unwrap();
        assert_eq!(completed(&reloaded, Stage::Report), vec!["A", "B"]);
        assert_eq!(reloaded.select_ready(Stage::Pdf, Stage::Report).len(), 4);
    }

    #[test]
    fn fatal_work_error_stops_batch() {
        let dir = tempfile::tempdir().unwrap();
        let keys = ["A", "B"];
        let mut store = store_with(dir.path(), &keys);
        for k in keys {
            store.mark_completed(k, Stage::Pdf).unwrap();
        }

        let result = store.apply_batch(Stage::Pdf, Stage::Report, 10, |r| {
            if r.entity_key == "B" {
                Err(StateError::UnknownEntity("sink unavailable".into()))
            } else {
                Ok(StepOutcome::Completed)
            }
        });

        assert!(result.is_err());
        assert_eq!(completed(&store, Stage::Report), vec!["A"]);
    }

    #[test]
    fn merge_sync_never_replaces_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Acme"]);
        store.mark_completed("Acme", Stage::Pdf).unwrap();

        let mut replacement = record("Acme");
        replacement.path_a = PathBuf::from("/elsewhere/Acme.pdf");
        let merge = store
            .merge_sync(
                Path::new("/hs"),
                Path::new("/sf"),
                None,
                vec![replacement, record("Globex")],
                vec![],
                vec!["Lonely.pdf".into()],
            )
            .unwrap();

        assert_eq!(merge.added, 1);
        assert_eq!(merge.conflicts, vec!["Acme"]);
        let acme = store.get("Acme").unwrap();
        assert_eq!(acme.path_a, PathBuf::from("/hs/Acme.pdf"));
        assert_eq!(acme.stage_pdf, StageStatus::Completed);
        assert_eq!(store.state().orphans_a, vec!["Acme.pdf"]);
        assert_eq!(store.state().orphans_b, vec!["Lonely.pdf"]);
    }

    #[test]
    fn merge_sync_same_files_is_not_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Acme"]);

        let merge = store
            .merge_sync(Path::new("/hs"), Path::new("/sf"), None, vec![record("Acme")], vec![], vec![])
            .unwrap();

        assert_eq!(merge, SyncMerge::default());
        assert!(store.state().orphans_a.is_empty());
        assert!(store.state().orphans_b.is_empty());
    }

    #[test]
    fn duplicate_keys_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let mut state = PipelineState::new();
        state.records = vec![record("Acme"), record("Acme")];
        std::fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();

        assert!(matches!(
            PipelineStateStore::open(&path),
            Err(StateError::DuplicateEntity(_))
        ));
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), &["Acme"]);
        store.mark_completed("Acme", Stage::Pdf).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn open_or_new_creates_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("targets.json");
        let store = PipelineStateStore::open_or_new(&path).unwrap();

        assert!(store.records().is_empty());
        assert!(path.exists());
    }
}
