//! Command-line surface. Each subcommand loads the state it needs, does one
//! job, and leaves the state file consistent on exit.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::config::{self, RunConfig, TemplateConfig};
use crate::pipeline::extraction::DocumentTextExtractor;
use crate::pipeline::linkage::{collect_identifiers, Matcher, NameNormalizer};
use crate::pipeline::report::{
    load_template_header, CsvVerdictSink, EvidenceLog, ReportRunner, VerdictSink,
};
use crate::pipeline::sections::SectionComparator;
use crate::pipeline::state::{MatchRecord, PipelineStateStore, Stage};
use crate::pipeline::PipelineError;

#[derive(Parser, Debug)]
#[command(name = "docpair")]
#[command(about = "Pair exported documents from two systems and verify them section by section")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// State file (defaults to ~/DocPair/targets.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// JSON run configuration; built-in defaults otherwise
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Match the two source folders and record new pairs
    Sync {
        /// Folder holding the first system's exports
        #[arg(long)]
        source_a: PathBuf,
        /// Folder holding the second system's exports
        #[arg(long)]
        source_b: PathBuf,
        /// Report template whose header row defines the output columns
        #[arg(long)]
        template: Option<PathBuf>,
    },
    /// Show per-stage progress and orphan counts
    Status {
        /// List orphaned identifiers
        #[arg(long)]
        orphans: bool,
    },
    /// Mark a stage completed for the given entities
    Mark {
        #[arg(long, value_enum)]
        stage: StageArg,
        /// Entity keys
        #[arg(required = true)]
        entities: Vec<String>,
    },
    /// Check completed flags against their artifacts and pick up new ones
    Reconcile,
    /// Compare ready pairs and write verdicts
    Report {
        /// Process at most this many entities
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Compare two files without touching the state
    Compare { file_a: PathBuf, file_b: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageArg {
    Pdf,
    Report,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Pdf => Stage::Pdf,
            StageArg::Report => Stage::Report,
        }
    }
}

impl Cli {
    pub fn state_path(&self) -> PathBuf {
        self.state.clone().unwrap_or_else(config::default_state_path)
    }

    pub fn load_config(&self) -> Result<RunConfig, PipelineError> {
        let config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        Ok(config)
    }
}

pub fn execute(cli: &Cli) -> Result<(), PipelineError> {
    let config = cli.load_config()?;
    let state_path = cli.state_path();

    match &cli.command {
        Commands::Sync {
            source_a,
            source_b,
            template,
        } => sync(&config, &state_path, source_a, source_b, template.as_deref()),
        Commands::Status { orphans } => status(&state_path, *orphans),
        Commands::Mark { stage, entities } => mark(&state_path, (*stage).into(), entities),
        Commands::Reconcile => reconcile(&config, &state_path),
        Commands::Report { limit } => report(&config, &state_path, limit.unwrap_or(usize::MAX)),
        Commands::Compare { file_a, file_b } => compare(&config, file_a, file_b),
    }
}

pub fn sync(
    config: &RunConfig,
    state_path: &Path,
    source_a: &Path,
    source_b: &Path,
    template: Option<&Path>,
) -> Result<(), PipelineError> {
    let matcher = Matcher::new(NameNormalizer::new(&config.year_token_pattern)?);
    let outcome = matcher.run(
        collect_identifiers(source_a, &config.file_extension)?,
        collect_identifiers(source_b, &config.file_extension)?,
    );

    for ambiguous in &outcome.ambiguous {
        tracing::warn!(
            base_key = %ambiguous.base_key,
            candidates_a = ?ambiguous.candidates_a,
            candidates_b = ?ambiguous.candidates_b,
            "Ambiguous base key left unmatched"
        );
    }

    let records: Vec<MatchRecord> = outcome
        .pairs
        .iter()
        .map(|pair| {
            MatchRecord::new(
                pair.entity_key.clone(),
                source_a.join(&pair.source_a),
                source_b.join(&pair.source_b),
                pair.pass,
            )
        })
        .collect();
    let matched = records.len();

    let mut store = PipelineStateStore::open_or_new(state_path)?;
    let merge = store.merge_sync(
        source_a,
        source_b,
        template,
        records,
        outcome.orphans_a,
        outcome.orphans_b,
    )?;

    println!("Matched {matched} pairs ({} new)", merge.added);
    for entity in &merge.conflicts {
        println!("  {entity}: already tracked with other files, new files listed as orphans");
    }
    println!(
        "Orphans: {} in source A, {} in source B",
        store.state().orphans_a.len(),
        store.state().orphans_b.len()
    );
    println!("State: {}", store.path().display());
    Ok(())
}

pub fn status(state_path: &Path, list_orphans: bool) -> Result<(), PipelineError> {
    let store = PipelineStateStore::open(state_path)?;
    let total = store.records().len();

    println!("Entities: {total}");
    for &stage in Stage::all() {
        println!(
            "  {:<13} {} completed, {} pending",
            stage.as_str(),
            total - store.pending(stage).len(),
            store.pending(stage).len()
        );
    }
    println!(
        "Ready for report: {}",
        store.select_ready(Stage::Pdf, Stage::Report).len()
    );

    let state = store.state();
    println!(
        "Orphans: {} in source A, {} in source B",
        state.orphans_a.len(),
        state.orphans_b.len()
    );
    if list_orphans {
        for name in &state.orphans_a {
            println!("  A  {name}");
        }
        for name in &state.orphans_b {
            println!("  B  {name}");
        }
    }
    Ok(())
}

pub fn mark(state_path: &Path, stage: Stage, entities: &[String]) -> Result<(), PipelineError> {
    let mut store = PipelineStateStore::open(state_path)?;
    for entity in entities {
        if store.mark_completed(entity, stage)? {
            println!("{entity}: {stage} completed");
        } else {
            println!("{entity}: {stage} already completed");
        }
    }
    Ok(())
}

/// Demote flags whose artifact disappeared, then harvest renderer artifacts
/// that appeared since the last run.
pub fn reconcile(config: &RunConfig, state_path: &Path) -> Result<(), PipelineError> {
    let mut store = PipelineStateStore::open(state_path)?;

    if config.artifact_dir.is_some() {
        let artifact_exists =
            |record: &MatchRecord| config.artifact_path(&record.entity_key).is_some_and(|p| p.is_file());

        let demoted = store.reconcile_all(Stage::Pdf, artifact_exists)?;
        for entity in &demoted {
            println!("{entity}: stage_pdf demoted (artifact missing)");
        }

        let harvest: Vec<String> = store
            .pending(Stage::Pdf)
            .into_iter()
            .filter(|r| artifact_exists(r))
            .map(|r| r.entity_key.clone())
            .collect();
        for entity in &harvest {
            store.mark_completed(entity, Stage::Pdf)?;
            println!("{entity}: stage_pdf completed (artifact found)");
        }
    } else {
        tracing::warn!("No artifact_dir configured, skipping stage_pdf reconciliation");
    }

    let report_path = config
        .resolve_output_dir(state_path)
        .join(config::REPORT_FILE_NAME);
    if report_path.exists() {
        let sink = open_sink(config, &store, &report_path)?;
        let demoted = store.reconcile_all(Stage::Report, |r| sink.contains(&r.entity_key))?;
        for entity in &demoted {
            println!("{entity}: stage_report demoted (no report row)");
        }
    } else {
        let demoted = store.reconcile_all(Stage::Report, |_| false)?;
        if !demoted.is_empty() {
            println!("Report {} missing, {} entities demoted", report_path.display(), demoted.len());
        }
    }

    Ok(())
}

pub fn report(config: &RunConfig, state_path: &Path, limit: usize) -> Result<(), PipelineError> {
    let mut store = PipelineStateStore::open(state_path)?;
    let output_dir = config.resolve_output_dir(state_path);

    let mut sink = open_sink(config, &store, &output_dir.join(config::REPORT_FILE_NAME))?;
    let evidence = EvidenceLog::new(&output_dir.join(config::EVIDENCE_FILE_NAME));
    let source = DocumentTextExtractor;
    let comparator = SectionComparator::new(&config.sections, &config.summary_section, &source)?;

    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, tester = %config.tester_name, "Starting report run");

    let summary = ReportRunner::new(&config.tester_name, comparator, &mut sink, &evidence)
        .run(&mut store, limit, run_id)?;

    println!(
        "Attempted {}, completed {}, failed {}, {} still pending",
        summary.attempted,
        summary.completed.len(),
        summary.failed.len(),
        summary.remaining()
    );
    for (entity, reason) in &summary.failed {
        println!("  {entity}: {reason}");
    }
    println!("Report: {}", sink.path().display());
    println!("Evidence: {}", evidence.path().display());
    Ok(())
}

pub fn compare(config: &RunConfig, file_a: &Path, file_b: &Path) -> Result<(), PipelineError> {
    let source = DocumentTextExtractor;
    let comparator = SectionComparator::new(&config.sections, &config.summary_section, &source)?;
    let verdict = comparator.compare_files(file_a, file_b)?;

    for section in &verdict.sections {
        println!("{:<14} {}  {}", section.key, section.verdict, section.reason);
    }
    println!("Test Result: {}", verdict.overall);
    Ok(())
}

/// Report sink laid out by the configured template, the template recorded
/// at sync time, or the built-in column set.
fn open_sink(
    config: &RunConfig,
    store: &PipelineStateStore,
    report_path: &Path,
) -> Result<CsvVerdictSink, PipelineError> {
    let section_keys: Vec<String> = config.sections.iter().map(|s| s.key.clone()).collect();

    let template = config
        .template
        .clone()
        .or_else(|| store.state().template_path.as_deref().map(TemplateConfig::at));
    let labels = match &template {
        Some(template) => load_template_header(template)?,
        None => CsvVerdictSink::synthesized_header(&section_keys),
    };

    Ok(CsvVerdictSink::open(report_path, labels, &section_keys)?)
}
