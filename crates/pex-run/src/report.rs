//! Batch summary written as `report.json`.

use std::fs;
use std::path::Path;

use pex_core::{to_canonical_json_bytes, PexError, RunProvenance, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::job::{FailureKind, JobResult};

/// Job counts of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// All jobs.
    pub total: usize,
    /// Jobs with `success == true`.
    pub passed: usize,
    /// Everything else.
    pub failed: usize,
}

/// Diagnostics kept for one failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureExcerpt {
    /// Job name.
    pub job: String,
    /// Parameter setting.
    pub parameter_id: usize,
    /// Repetition.
    pub run_id: usize,
    /// Failure class.
    pub kind: FailureKind,
    /// One-line summary.
    pub message: String,
    /// Captured output tail.
    pub excerpt: String,
}

/// Summary of a finished batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Report schema.
    pub schema: SchemaVersion,
    /// Study name.
    pub study: String,
    /// Strategy label.
    pub strategy: String,
    /// `local`, `remote` or `collect`.
    pub mode: String,
    /// Job counts.
    pub totals: Totals,
    /// One entry per failed job, in key order.
    pub failures: Vec<FailureExcerpt>,
    /// Rows in the aggregated QoI tables.
    pub qoi_rows: usize,
    /// Integer/float cross-casts performed while preparing variants.
    pub cast_warnings: usize,
    /// Hashes, seed and creation time.
    pub provenance: RunProvenance,
}

impl BatchReport {
    /// Summarizes `results`.
    pub fn new(
        study: &str,
        strategy: &str,
        mode: &str,
        results: &[JobResult],
        qoi_rows: usize,
        cast_warnings: usize,
        provenance: RunProvenance,
    ) -> Self {
        let passed = results.iter().filter(|result| result.success).count();
        let failures = results
            .iter()
            .filter_map(|result| {
                let failure = result.failure.as_ref()?;
                Some(FailureExcerpt {
                    job: result.name.clone(),
                    parameter_id: result.parameter_id,
                    run_id: result.run_id,
                    kind: failure.kind,
                    message: failure.message.clone(),
                    excerpt: failure.excerpt.clone(),
                })
            })
            .collect();
        Self {
            schema: SchemaVersion::default(),
            study: study.to_string(),
            strategy: strategy.to_string(),
            mode: mode.to_string(),
            totals: Totals {
                total: results.len(),
                passed,
                failed: results.len() - passed,
            },
            failures,
            qoi_rows,
            cast_warnings,
            provenance,
        }
    }

    /// True when no job failed.
    pub fn all_passed(&self) -> bool {
        self.totals.failed == 0
    }

    /// Writes the report as canonical JSON.
    pub fn write(&self, path: &Path) -> Result<(), PexError> {
        let bytes = to_canonical_json_bytes(self)?;
        fs::write(path, bytes).map_err(|err| PexError::io("report_write", path, err))
    }
}
