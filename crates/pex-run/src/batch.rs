//! Batch orchestration: prepare, materialize, dispatch, aggregate, report.

use std::path::Path;

use pex_core::{stable_hash_string, ErrorInfo, PexError, RunProvenance};
use pex_doc::Document;
use pex_qoi::{Aggregator, MetadataTable, ParameterTable, QoiResult};
use pex_sample::MarkovReport;
use tracing::{info, warn};

use crate::backend::{ExecutionBackend, ProcessBackend};
use crate::dispatch::{dispatch_local, extract, BatchSettings};
use crate::env::JobEnvironment;
use crate::job::{FailureKind, JobDescriptor, JobFailure, JobResult};
use crate::prepare::{prepare_batch, sample_points, PreparedBatch};
use crate::remote::{run_remote, RemoteBundle, RemoteExecutor, RemoteResults, BUNDLE_SCHEMA};
use crate::report::BatchReport;
use crate::ssh::SshExecutor;
use crate::study::Study;
use crate::ulam::markov_report;

/// Parameter table file at the workspace root.
pub const PARAMETERS_FILE: &str = "parameters.csv";
/// Metadata table joined with parameters.
pub const METADATA_FILE: &str = "metadata.csv";
/// Batch report.
pub const REPORT_FILE: &str = "report.json";
/// Box transition model for box/Ulam studies.
pub const MARKOV_FILE: &str = "markov.json";

/// Everything a finished batch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// One result per job, in key order.
    pub results: Vec<JobResult>,
    /// Aggregated QoI tables of the successful jobs.
    pub qoi: QoiResult,
    /// Timing and outcome of every job.
    pub metadata: MetadataTable,
    /// Summary also written as `report.json`.
    pub report: BatchReport,
    /// Box transition model, for box/Ulam studies with post-processing configured.
    pub markov: Option<MarkovReport>,
}

fn settings(study: &Study) -> BatchSettings {
    BatchSettings {
        qoi: study.qoi.clone(),
        index_columns: study.index_columns.clone(),
        workers: study.workers,
        timeout_seconds: study.timeout_seconds,
        keep_output: study.keep_output,
    }
}

fn prepare(study: &Study) -> Result<(Document, PreparedBatch), PexError> {
    info!(study = %study.name, document = %study.base_document.display(), "loading base document");
    let base = Document::load(&study.base_document)?;
    let points = sample_points(&study.strategy, study.runs, study.seed)?;
    let prepared = prepare_batch(&base, points, &study.post_changes, study.seed, study.id_width)?;
    if prepared.cast_warnings > 0 {
        warn!(casts = prepared.cast_warnings, "numeric values were cross-cast while preparing variants");
    }
    info!(jobs = prepared.jobs.len(), "prepared all variants");
    Ok((base, prepared))
}

fn materialize(env: &JobEnvironment, prepared: &PreparedBatch) -> Result<Vec<JobDescriptor>, PexError> {
    prepared
        .jobs
        .iter()
        .map(|job| env.allocate(job.point.parameter_id, job.point.run_id, &job.document))
        .collect()
}

/// Runs a study locally or on its remote host, as configured.
pub fn run_study(study: &Study) -> Result<BatchOutcome, PexError> {
    match &study.remote {
        Some(spec) => run_study_remote(study, &mut SshExecutor::new(spec)),
        None => run_study_local(
            study,
            &ProcessBackend::new(&study.executable, study.extra_args.clone()),
        ),
    }
}

/// Runs a study on the local pool with the given backend.
pub fn run_study_local(study: &Study, backend: &dyn ExecutionBackend) -> Result<BatchOutcome, PexError> {
    let (base, prepared) = prepare(study)?;
    let env = JobEnvironment::new(&study.workspace, study.id_width)?;
    prepared.parameters.write_csv(&env.root().join(PARAMETERS_FILE))?;
    let jobs = materialize(&env, &prepared)?;
    let results = dispatch_local(&jobs, backend, &settings(study))?;
    finalize(study, &base, &prepared.parameters, results, "local", prepared.cast_warnings)
}

/// Runs a study on one remote host through `executor`.
///
/// The batch is prepared and validated locally first, so configuration
/// errors never reach the remote host.
pub fn run_study_remote(study: &Study, executor: &mut dyn RemoteExecutor) -> Result<BatchOutcome, PexError> {
    let spec = study.remote.as_ref().ok_or_else(|| {
        PexError::Config(ErrorInfo::new("config.remote", "study has no remote host configured"))
    })?;
    let (base, prepared) = prepare(study)?;
    let env = JobEnvironment::new(&study.workspace, study.id_width)?;
    prepared.parameters.write_csv(&env.root().join(PARAMETERS_FILE))?;

    let executable = study
        .executable
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            PexError::Config(
                ErrorInfo::new("config.executable", "executable path has no file name")
                    .with_context("path", study.executable.display().to_string()),
            )
        })?;
    let bundle = RemoteBundle {
        schema: BUNDLE_SCHEMA,
        name: study.name.clone(),
        strategy: study.strategy.clone(),
        points: prepared.points(),
        base_document: base.clone(),
        executable: executable.to_string(),
        extra_args: study.extra_args.clone(),
        settings: settings(study),
        post_changes: study.post_changes.clone(),
        seed: study.seed,
        id_width: study.id_width,
    };
    let remote = run_remote(executor, spec, &bundle, &study.executable, env.root())?;
    finalize(study, &base, &prepared.parameters, remote.results, "remote", prepared.cast_warnings)
}

/// Writes every variant and the parameter table without running anything.
pub fn materialize_study(study: &Study) -> Result<Vec<JobDescriptor>, PexError> {
    let (_, prepared) = prepare(study)?;
    let env = JobEnvironment::new(&study.workspace, study.id_width)?;
    prepared.parameters.write_csv(&env.root().join(PARAMETERS_FILE))?;
    let jobs = materialize(&env, &prepared)?;
    info!(jobs = jobs.len(), workspace = %env.root().display(), "materialized variants");
    Ok(jobs)
}

/// Rebuilds tables and the report from an existing workspace using each
/// job's `status.json`, re-extracting QoI from the output trees.
pub fn collect_workspace(study: &Study) -> Result<BatchOutcome, PexError> {
    let base = Document::load(&study.base_document)?;
    let env = JobEnvironment::new(&study.workspace, study.id_width)?;
    let parameters = ParameterTable::read_csv(&env.root().join(PARAMETERS_FILE))?;
    let settings = settings(study);

    let mut results = Vec::new();
    for dir in env.finished_jobs()? {
        let mut result = JobResult::read_status(&dir)?;
        if result.success {
            let job = env.descriptor(result.parameter_id, result.run_id, base.format());
            if !job.output.exists() && !study.keep_output {
                warn!(job = %job.name, "output was removed after extraction, no QoI to collect");
            } else {
                match extract(&job, &settings) {
                    Ok(tables) => result.qoi = Some(tables),
                    Err(err) => {
                        warn!(job = %job.name, error = %err, "quantity of interest extraction failed");
                        result = JobResult::failed(
                            &job,
                            result.exit_code,
                            JobFailure {
                                kind: FailureKind::Qoi,
                                message: err.to_string(),
                                excerpt: String::new(),
                            },
                        );
                    }
                }
            }
        }
        results.push(result);
    }
    results.sort_by_key(JobResult::key);
    info!(jobs = results.len(), "collected workspace");
    finalize(study, &base, &parameters, results, "collect", 0)
}

/// Remote side of the protocol: prepares and runs a bundle with the local
/// pool under `out`, then writes the results file.
pub fn execute_bundle(bundle_path: &Path, out: &Path, results_path: &Path) -> Result<RemoteResults, PexError> {
    let bundle = RemoteBundle::read(bundle_path)?;
    let bundle_dir = match bundle_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let executable = bundle_dir.join(&bundle.executable);
    let executable =
        std::fs::canonicalize(&executable).map_err(|err| PexError::io("bundle_executable", &executable, err))?;
    info!(study = %bundle.name, jobs = bundle.points.len(), "executing bundle");
    let prepared = prepare_batch(
        &bundle.base_document,
        bundle.points.clone(),
        &bundle.post_changes,
        bundle.seed,
        bundle.id_width,
    )?;
    let env = JobEnvironment::new(out, bundle.id_width)?;
    let jobs = materialize(&env, &prepared)?;
    let backend = ProcessBackend::new(executable, bundle.extra_args.clone());
    let results = RemoteResults {
        schema: BUNDLE_SCHEMA,
        results: dispatch_local(&jobs, &backend, &bundle.settings)?,
    };
    results.write(results_path)?;
    Ok(results)
}

fn finalize(
    study: &Study,
    base: &Document,
    parameters: &ParameterTable,
    results: Vec<JobResult>,
    mode: &str,
    cast_warnings: usize,
) -> Result<BatchOutcome, PexError> {
    let root = study.workspace.as_path();

    let mut aggregator = Aggregator::new(&study.qoi);
    for result in &results {
        if let (true, Some(tables)) = (result.success, &result.qoi) {
            aggregator.add(result.parameter_id, result.run_id, tables.clone());
        }
    }
    let qoi = aggregator.finish();
    qoi.write_csv_dir(root)?;

    let metadata = MetadataTable::new(results.iter().map(JobResult::metadata).collect());
    metadata.write_joined_csv(parameters, &root.join(METADATA_FILE))?;

    let markov = match (&study.box_ulam, study.strategy.box_ulam()) {
        (Some(spec), Some(strategy)) => {
            let report = markov_report(&strategy?, spec, parameters, &results)?;
            let bytes = pex_core::to_canonical_json_bytes(&report)?;
            let path = root.join(MARKOV_FILE);
            std::fs::write(&path, bytes).map_err(|err| PexError::io("markov_write", &path, err))?;
            Some(report)
        }
        _ => None,
    };

    let provenance = RunProvenance::now(stable_hash_string(study)?, stable_hash_string(base.root())?, study.seed);
    let report = BatchReport::new(
        &study.name,
        study.strategy.label(),
        mode,
        &results,
        qoi.row_count(),
        cast_warnings,
        provenance,
    );
    report.write(&root.join(REPORT_FILE))?;
    info!(
        total = report.totals.total,
        passed = report.totals.passed,
        failed = report.totals.failed,
        "batch finished"
    );
    Ok(BatchOutcome {
        results,
        qoi,
        metadata,
        report,
        markov,
    })
}
