//! Study files: the YAML description of one orchestration run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use pex_core::{from_yaml_slice, ErrorInfo, PexError};
use pex_doc::PostChange;
use pex_sample::StrategySpec;
use serde::{Deserialize, Serialize};

/// Largest supported zero-padding width for job identifiers.
pub const MAX_ID_WIDTH: usize = 12;

fn config_error(code: &str, message: impl Into<String>) -> PexError {
    PexError::Config(ErrorInfo::new(code, message))
}

/// Remote host used instead of the local pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSpec {
    /// `user@host` or an ssh config alias.
    pub host: String,
    /// Directory on the remote host under which a fresh scratch directory is created.
    #[serde(default = "RemoteSpec::default_scratch_root")]
    pub scratch_root: String,
    /// Local `pex` binary to upload; when absent `pex` must be on the remote `PATH`.
    #[serde(default)]
    pub remote_cli: Option<PathBuf>,
    /// Extra arguments passed to every `ssh`/`scp` invocation.
    #[serde(default)]
    pub ssh_options: Vec<String>,
}

impl RemoteSpec {
    fn default_scratch_root() -> String {
        "/tmp".to_string()
    }
}

/// Post-processing for box/Ulam studies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxUlamSpec {
    /// Artifact holding the final state of each job.
    pub result_qoi: String,
    /// Columns of the artifact's last row giving the final coordinates, one per axis.
    pub result_columns: Vec<String>,
    /// Boxes seeding the propagated distribution; empty means all boxes.
    #[serde(default)]
    pub initial_boxes: Vec<usize>,
    /// Number of propagation steps.
    #[serde(default = "BoxUlamSpec::default_steps")]
    pub steps: usize,
    /// Number of dominant eigenpairs reported.
    #[serde(default = "BoxUlamSpec::default_eigenpairs")]
    pub eigenpairs: usize,
}

impl BoxUlamSpec {
    fn default_steps() -> usize {
        10
    }

    fn default_eigenpairs() -> usize {
        4
    }
}

/// One orchestration run: base document, strategy, executable and workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    /// Study name used in reports and logs.
    pub name: String,
    /// Base configuration document (JSON or YAML).
    pub base_document: PathBuf,
    /// External executable invoked once per job.
    pub executable: PathBuf,
    /// Root directory of this orchestration run.
    pub workspace: PathBuf,
    /// Artifact names collected from each job's output directory.
    pub qoi: Vec<String>,
    /// Repetitions per parameter setting.
    #[serde(default = "Study::default_runs")]
    pub runs: usize,
    /// Requested local workers.
    #[serde(default = "Study::default_workers")]
    pub workers: usize,
    /// Per-job wall clock limit.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Zero-padding width of job identifiers.
    #[serde(default = "Study::default_id_width")]
    pub id_width: usize,
    /// Master seed for random strategies and per-job seeds.
    #[serde(default)]
    pub seed: u64,
    /// Keep job output trees after extraction.
    #[serde(default = "Study::default_keep_output")]
    pub keep_output: bool,
    /// Arguments appended after the fixed executable contract.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Per-artifact index-column overrides.
    #[serde(default)]
    pub index_columns: BTreeMap<String, usize>,
    /// Changes applied to every variant after the sampled parameters.
    #[serde(default)]
    pub post_changes: Vec<PostChange>,
    /// Sampling strategy.
    pub strategy: StrategySpec,
    /// Remote host; the local pool is used when absent.
    #[serde(default)]
    pub remote: Option<RemoteSpec>,
    /// Markov post-processing for box/Ulam studies.
    #[serde(default)]
    pub box_ulam: Option<BoxUlamSpec>,
}

impl Study {
    fn default_runs() -> usize {
        1
    }

    fn default_workers() -> usize {
        1
    }

    fn default_id_width() -> usize {
        6
    }

    fn default_keep_output() -> bool {
        true
    }

    /// Checks the study for batch-fatal configuration errors.
    pub fn validate(&self) -> Result<(), PexError> {
        if self.name.trim().is_empty() {
            return Err(config_error("config.name", "study name must not be empty"));
        }
        if self.qoi.is_empty() {
            return Err(config_error("config.qoi", "at least one quantity of interest is required"));
        }
        if self.runs == 0 {
            return Err(config_error("config.runs", "runs must be at least 1"));
        }
        if self.workers == 0 {
            return Err(config_error("config.workers", "workers must be at least 1"));
        }
        if !(1..=MAX_ID_WIDTH).contains(&self.id_width) {
            return Err(config_error(
                "config.id_width",
                format!("id_width must be between 1 and {MAX_ID_WIDTH}, got {}", self.id_width),
            ));
        }
        if self.timeout_seconds == Some(0) {
            return Err(config_error("config.timeout", "timeout_seconds must be positive"));
        }
        if self.remote.is_none() && !self.executable.is_file() {
            return Err(PexError::Config(
                ErrorInfo::new("config.executable", "executable not found")
                    .with_context("path", self.executable.display().to_string()),
            ));
        }
        if let Some(ulam) = &self.box_ulam {
            self.validate_box_ulam(ulam)?;
        }
        Ok(())
    }

    fn validate_box_ulam(&self, ulam: &BoxUlamSpec) -> Result<(), PexError> {
        let StrategySpec::BoxUlam { axes } = &self.strategy else {
            return Err(config_error(
                "config.box_ulam",
                "box_ulam post-processing requires the box-ulam strategy",
            ));
        };
        if ulam.result_columns.len() != axes.len() {
            return Err(config_error(
                "config.box_ulam",
                format!(
                    "{} result columns given for {} axes",
                    ulam.result_columns.len(),
                    axes.len()
                ),
            ));
        }
        if !self.qoi.contains(&ulam.result_qoi) {
            return Err(PexError::Config(
                ErrorInfo::new("config.box_ulam", "result artifact is not among the requested qoi")
                    .with_context("artifact", ulam.result_qoi.clone()),
            ));
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let absolute = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base_dir.join(path)
            }
        };
        self.base_document = absolute(&self.base_document);
        self.executable = absolute(&self.executable);
        self.workspace = absolute(&self.workspace);
        if let Some(remote) = &mut self.remote {
            remote.remote_cli = remote.remote_cli.as_deref().map(absolute);
        }
    }
}

/// Loads and validates a study file. Relative paths are taken relative to
/// the directory containing the study file.
pub fn load_study(path: &Path) -> Result<Study, PexError> {
    let bytes = fs::read(path).map_err(|err| PexError::io("study_read", path, err))?;
    let mut study: Study = from_yaml_slice(&bytes).map_err(|err| match err {
        PexError::Serde(info) => PexError::Config(info.with_context("path", path.display().to_string())),
        other => other,
    })?;
    let base_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let base_dir = fs::canonicalize(&base_dir).map_err(|err| PexError::io("study_dir", &base_dir, err))?;
    study.resolve_paths(&base_dir);
    study.validate()?;
    Ok(study)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUDY: &str = r#"
name: speed-study
base_document: scenario.json
executable: bin/simulate
workspace: out
qoi: [evacuation_time.txt]
strategy:
  type: full-grid
  parameters:
    - address: speed
      values: [1.0, 1.2]
remote:
  host: user@cluster
"#;

    fn parsed() -> Study {
        serde_yaml::from_str(STUDY).unwrap()
    }

    #[test]
    fn defaults_are_filled_in() {
        let study = parsed();
        assert_eq!(study.runs, 1);
        assert_eq!(study.workers, 1);
        assert_eq!(study.id_width, 6);
        assert!(study.keep_output);
        assert_eq!(study.remote.as_ref().unwrap().scratch_root, "/tmp");
        assert!(study.timeout_seconds.is_none());
    }

    #[test]
    fn relative_paths_follow_the_study_file() {
        let mut study = parsed();
        study.resolve_paths(Path::new("/studies/speed"));
        assert_eq!(study.base_document, Path::new("/studies/speed/scenario.json"));
        assert_eq!(study.workspace, Path::new("/studies/speed/out"));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut study = parsed();
        assert!(study.validate().is_ok());
        study.id_width = 0;
        assert_eq!(study.validate().unwrap_err().info().code, "config.id_width");
        study.id_width = 6;
        study.qoi.clear();
        assert_eq!(study.validate().unwrap_err().info().code, "config.qoi");
    }

    #[test]
    fn box_ulam_requires_matching_strategy() {
        let mut study = parsed();
        study.box_ulam = Some(BoxUlamSpec {
            result_qoi: "evacuation_time.txt".into(),
            result_columns: vec!["x".into()],
            initial_boxes: vec![],
            steps: 3,
            eigenpairs: 2,
        });
        assert_eq!(study.validate().unwrap_err().info().code, "config.box_ulam");
    }
}
