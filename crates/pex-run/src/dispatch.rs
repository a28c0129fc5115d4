//! Local dispatch: a bounded worker pool that fans jobs out and reassembles
//! their results by key.

use std::collections::BTreeMap;
use std::fs;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use pex_core::{ErrorInfo, PexError};
use pex_qoi::read_artifact;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::ExecutionBackend;
use crate::job::{FailureKind, JobDescriptor, JobFailure, JobResult};

/// Settings shared by every job of a batch, shipped unchanged in remote bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Artifacts extracted from each job's output directory.
    pub qoi: Vec<String>,
    /// Per-artifact index-column overrides.
    #[serde(default)]
    pub index_columns: BTreeMap<String, usize>,
    /// Requested worker count.
    pub workers: usize,
    /// Per-job wall clock limit in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Keep output trees after extraction.
    pub keep_output: bool,
}

impl BatchSettings {
    fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

/// Worker count actually used: `min(requested, jobs, cores)`, at least 1.
///
/// Requesting more workers than cores is allowed but logged.
pub fn effective_workers(requested: usize, jobs: usize) -> usize {
    let cores = thread::available_parallelism().map(usize::from).unwrap_or(1);
    if requested > cores {
        warn!(requested, cores, "more workers requested than cores available, capping");
    }
    requested.min(jobs).min(cores).max(1)
}

/// Runs every job on a local pool and returns the results sorted by key.
///
/// Job failures are part of the returned results; an `Err` only signals that
/// the pool itself could not be set up.
pub fn dispatch_local(
    jobs: &[JobDescriptor],
    backend: &dyn ExecutionBackend,
    settings: &BatchSettings,
) -> Result<Vec<JobResult>, PexError> {
    if jobs.is_empty() {
        return Ok(Vec::new());
    }
    let workers = effective_workers(settings.workers, jobs.len());
    info!(jobs = jobs.len(), workers, "dispatching jobs locally");
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("pex-worker-{index}"))
        .build()
        .map_err(|err| PexError::Job(ErrorInfo::new("thread_pool", err.to_string())))?;

    let (sender, receiver) = mpsc::channel::<JobResult>();
    pool.scope(|scope| {
        for job in jobs {
            let sender = sender.clone();
            scope.spawn(move |_| {
                let result = run_job(job, backend, settings);
                // The receiver outlives the scope.
                let _ = sender.send(result);
            });
        }
    });
    drop(sender);

    let mut results: Vec<JobResult> = receiver.into_iter().collect();
    results.sort_by_key(JobResult::key);
    let failed = results.iter().filter(|result| !result.success).count();
    info!(total = results.len(), failed, "local dispatch finished");
    Ok(results)
}

/// Executes, extracts and records a single job. Never fails: every problem
/// becomes part of the returned result.
pub(crate) fn run_job(job: &JobDescriptor, backend: &dyn ExecutionBackend, settings: &BatchSettings) -> JobResult {
    debug!(job = %job.name, "starting job");
    let outcome = backend.run(job, settings.timeout());
    let result = match outcome.failure() {
        Some(failure) => {
            warn!(job = %job.name, kind = ?failure.kind, message = %failure.message, "job failed");
            JobResult::failed(job, outcome.exit_code, failure)
        }
        None => match extract(job, settings) {
            Ok(tables) => {
                if !settings.keep_output {
                    if let Err(err) = fs::remove_dir_all(&job.output) {
                        warn!(job = %job.name, error = %err, "could not remove job output");
                    }
                }
                JobResult::passed(job, outcome.wall_time.as_secs_f64(), tables)
            }
            Err(err) => {
                warn!(job = %job.name, error = %err, "quantity of interest extraction failed");
                JobResult::failed(
                    job,
                    outcome.exit_code,
                    JobFailure {
                        kind: FailureKind::Qoi,
                        message: err.to_string(),
                        excerpt: String::new(),
                    },
                )
            }
        },
    };
    if let Err(err) = result.write_status(&job.dir) {
        warn!(job = %job.name, error = %err, "could not write job status");
    }
    debug!(job = %job.name, success = result.success, "job finished");
    result
}

pub(crate) fn extract(job: &JobDescriptor, settings: &BatchSettings) -> Result<Vec<pex_qoi::QoiTable>, PexError> {
    settings
        .qoi
        .iter()
        .map(|name| read_artifact(&job.output, name, settings.index_columns.get(name).copied()))
        .collect()
}
