//! Turning a strategy and a base document into validated variants before any
//! job is dispatched.

use std::collections::BTreeMap;

use pex_core::{job_name, PexError, RngHandle};
use pex_doc::{apply_all, Document, JobContext, Node, PathAddress, PostChange};
use pex_qoi::{ParameterRow, ParameterTable};
use pex_sample::{ensure_unique_keys, expand_runs, ParameterPoint, SamplingStrategy, StrategySpec};
use tracing::{debug, info};

/// Substream of the master seed reserved for sampling.
const SAMPLING_SUBSTREAM: u64 = 0x5341_4d50;

/// One fully mutated variant ready to be written into a job directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedJob {
    /// The sampled assignment.
    pub point: ParameterPoint,
    /// Zero-padded job name.
    pub name: String,
    /// Base document with parameters and post changes applied.
    pub document: Document,
}

/// All variants of a batch plus the parameter table describing them.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBatch {
    /// Jobs in `(parameter_id, run_id)` order.
    pub jobs: Vec<PreparedJob>,
    /// Value written at each varied address, per job.
    pub parameters: ParameterTable,
    /// Integer/float cross-casts performed while mutating.
    pub cast_warnings: usize,
}

impl PreparedBatch {
    /// Sampled points of all jobs.
    pub fn points(&self) -> Vec<ParameterPoint> {
        self.jobs.iter().map(|job| job.point.clone()).collect()
    }
}

/// Samples the strategy and expands every point into `runs` repetitions.
pub fn sample_points(strategy: &StrategySpec, runs: usize, seed: u64) -> Result<Vec<ParameterPoint>, PexError> {
    let mut rng = RngHandle::substream(seed, SAMPLING_SUBSTREAM);
    let points = strategy.points(&mut rng)?;
    info!(strategy = strategy.label(), points = points.len(), runs, "sampled parameter points");
    expand_runs(&points, runs)
}

/// Applies every point and post change to the base document.
///
/// Any unknown address, type mismatch or duplicate job key fails the whole
/// batch; nothing is written to disk here.
pub fn prepare_batch(
    base: &Document,
    points: Vec<ParameterPoint>,
    post_changes: &[PostChange],
    seed: u64,
    id_width: usize,
) -> Result<PreparedBatch, PexError> {
    ensure_unique_keys(&points)?;

    let mut addresses: BTreeMap<String, PathAddress> = BTreeMap::new();
    let mut columns: Vec<String> = Vec::new();
    for point in &points {
        for key in point.values.keys() {
            if !addresses.contains_key(key) {
                addresses.insert(key.clone(), key.parse::<PathAddress>()?);
                columns.push(key.clone());
            }
        }
    }

    let mut jobs = Vec::with_capacity(points.len());
    let mut rows = Vec::with_capacity(points.len());
    let mut cast_warnings = 0;
    for point in points {
        let name = job_name(point.parameter_id, point.run_id, id_width);
        let ctx = JobContext {
            parameter_id: point.parameter_id,
            run_id: point.run_id,
            job_name: &name,
            master_seed: seed,
        };
        let substitutions: Vec<(&PathAddress, Node)> = point
            .values
            .iter()
            .map(|(key, value)| (&addresses[key], value.clone()))
            .chain(
                post_changes
                    .iter()
                    .map(|change| (change.address(), change.value_for(&ctx))),
            )
            .collect();
        let applied = apply_all(base, substitutions).map_err(|err| with_job(err.into(), &name))?;
        cast_warnings += applied.warnings.len();
        debug!(job = %name, "prepared variant");

        rows.push(ParameterRow {
            parameter_id: point.parameter_id,
            run_id: point.run_id,
            box_id: point.box_id,
            values: columns
                .iter()
                .map(|column| point.values.get(column).map(Node::to_cell).unwrap_or_default())
                .collect(),
        });
        jobs.push(PreparedJob {
            point,
            name,
            document: applied.document,
        });
    }
    jobs.sort_by_key(|job| job.point.key());
    rows.sort_by_key(|row| (row.parameter_id, row.run_id));

    Ok(PreparedBatch {
        jobs,
        parameters: ParameterTable {
            addresses: columns,
            rows,
        },
        cast_warnings,
    })
}

fn with_job(err: PexError, job: &str) -> PexError {
    match err {
        PexError::Path(info) => PexError::Path(info.with_context("job", job)),
        PexError::Mutation(info) => PexError::Mutation(info.with_context("job", job)),
        other => other,
    }
}
