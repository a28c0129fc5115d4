//! Job descriptors and per-job outcomes.

use std::fs;
use std::path::{Path, PathBuf};

use pex_core::{from_json_slice, to_canonical_json_bytes, PexError};
use pex_qoi::{MetadataRow, QoiTable};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// File written into every job directory after the job finished.
pub const STATUS_FILE: &str = "status.json";

/// Where one job reads its input and writes its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Parameter setting.
    pub parameter_id: usize,
    /// Repetition.
    pub run_id: usize,
    /// Zero-padded job name.
    pub name: String,
    /// Job directory owned exclusively by this job.
    pub dir: PathBuf,
    /// Mutated input document.
    pub input: PathBuf,
    /// Output directory handed to the executable (not created in advance).
    pub output: PathBuf,
}

impl JobDescriptor {
    /// Composite key.
    pub fn key(&self) -> (usize, usize) {
        (self.parameter_id, self.run_id)
    }
}

/// Why a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The wall clock limit expired and the process was killed.
    Timeout,
    /// The executable exited with a nonzero code or was killed by a signal.
    ProcessError,
    /// The executable could not be started.
    Spawn,
    /// The executable succeeded but a requested artifact was missing or invalid.
    Qoi,
}

/// Failure classification with the captured diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Failure class.
    pub kind: FailureKind,
    /// One-line summary.
    pub message: String,
    /// Tail of the captured stdout and stderr.
    #[serde(default)]
    pub excerpt: String,
}

/// Outcome of one job. Failed jobs carry no QoI and a NaN wall time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Parameter setting.
    pub parameter_id: usize,
    /// Repetition.
    pub run_id: usize,
    /// Zero-padded job name.
    pub name: String,
    /// Exit code 0 and every requested artifact extracted.
    pub success: bool,
    /// Seconds of wall time; NaN for failures, stored as `null`.
    #[serde(serialize_with = "nan_as_null", deserialize_with = "null_as_nan")]
    pub wall_time: f64,
    /// Exit code when the process ended on its own.
    pub exit_code: Option<i32>,
    /// Whether the timeout fired.
    #[serde(default)]
    pub timed_out: bool,
    /// Present exactly when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
    /// Extracted tables, present exactly when `success` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qoi: Option<Vec<QoiTable>>,
}

impl JobResult {
    /// Successful job with its extracted tables.
    pub fn passed(job: &JobDescriptor, wall_time: f64, qoi: Vec<QoiTable>) -> Self {
        Self {
            parameter_id: job.parameter_id,
            run_id: job.run_id,
            name: job.name.clone(),
            success: true,
            wall_time,
            exit_code: Some(0),
            timed_out: false,
            failure: None,
            qoi: Some(qoi),
        }
    }

    /// Failed job; the wall time becomes NaN.
    pub fn failed(job: &JobDescriptor, exit_code: Option<i32>, failure: JobFailure) -> Self {
        Self {
            parameter_id: job.parameter_id,
            run_id: job.run_id,
            name: job.name.clone(),
            success: false,
            wall_time: f64::NAN,
            exit_code,
            timed_out: failure.kind == FailureKind::Timeout,
            failure: Some(failure),
            qoi: None,
        }
    }

    /// Composite key.
    pub fn key(&self) -> (usize, usize) {
        (self.parameter_id, self.run_id)
    }

    /// Metadata row for this job.
    pub fn metadata(&self) -> MetadataRow {
        MetadataRow {
            parameter_id: self.parameter_id,
            run_id: self.run_id,
            success: self.success,
            wall_time: self.wall_time,
            exit_code: self.exit_code,
            timed_out: self.timed_out,
        }
    }

    /// Writes `status.json` (the result without its QoI payload) into `dir`.
    pub fn write_status(&self, dir: &Path) -> Result<(), PexError> {
        let status = JobResult {
            qoi: None,
            ..self.clone()
        };
        let path = dir.join(STATUS_FILE);
        let bytes = to_canonical_json_bytes(&status)?;
        fs::write(&path, bytes).map_err(|err| PexError::io("status_write", &path, err))
    }

    /// Reads a `status.json` written by [`JobResult::write_status`].
    pub fn read_status(dir: &Path) -> Result<Self, PexError> {
        let path = dir.join(STATUS_FILE);
        let bytes = fs::read(&path).map_err(|err| PexError::io("status_read", &path, err))?;
        from_json_slice(&bytes)
    }
}

fn nan_as_null<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_some(value)
    } else {
        serializer.serialize_none()
    }
}

fn null_as_nan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> JobDescriptor {
        JobDescriptor {
            parameter_id: 1,
            run_id: 0,
            name: "000001_000000".into(),
            dir: PathBuf::from("/w/000001_000000"),
            input: PathBuf::from("/w/000001_000000/input.json"),
            output: PathBuf::from("/w/000001_000000/output"),
        }
    }

    #[test]
    fn failed_results_round_trip_with_nan() {
        let result = JobResult::failed(
            &descriptor(),
            None,
            JobFailure {
                kind: FailureKind::Timeout,
                message: "timed out after 1s".into(),
                excerpt: String::new(),
            },
        );
        assert!(result.timed_out);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"wall_time\":null"));
        let back: JobResult = serde_json::from_str(&json).unwrap();
        assert!(back.wall_time.is_nan());
        assert_eq!(back.failure, result.failure);
    }

    #[test]
    fn metadata_mirrors_result() {
        let result = JobResult::passed(&descriptor(), 0.5, Vec::new());
        let row = result.metadata();
        assert!(row.success);
        assert_eq!(row.exit_code, Some(0));
        assert_eq!(row.wall_time, 0.5);
    }
}
