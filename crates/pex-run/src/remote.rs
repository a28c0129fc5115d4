//! Remote single-host execution.
//!
//! The orchestrator talks to the host through a [`RemoteExecutor`] and ships
//! a schema'd JSON [`RemoteBundle`]. The far side runs `pex remote-worker`,
//! which prepares and dispatches the bundle with the local pool, and
//! `pex pack`, which zips the output tree for the trip back.

use std::fs;
use std::path::{Path, PathBuf};

use pex_core::{from_json_slice, to_json_bytes, ErrorInfo, PexError, SchemaVersion};
use pex_doc::{Document, PostChange};
use pex_sample::{ParameterPoint, StrategySpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::archive::unpack_archive;
use crate::dispatch::BatchSettings;
use crate::job::JobResult;
use crate::study::RemoteSpec;

/// Schema of [`RemoteBundle`] and [`RemoteResults`].
pub const BUNDLE_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

const BUNDLE_FILE: &str = "bundle.json";
const RESULTS_FILE: &str = "results.json";
const OUTPUT_DIR: &str = "out";
const ARCHIVE_FILE: &str = "out.zip";
const REMOTE_CLI: &str = "pex";

pub(crate) fn remote_error(code: &str, message: impl Into<String>) -> PexError {
    PexError::Remote(ErrorInfo::new(code, message))
}

/// Captured result of a remote command that exited with status 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

/// Minimal remote session used by the protocol.
///
/// Every method fails with [`PexError::Remote`]; `run` also fails when the
/// command exits nonzero.
pub trait RemoteExecutor {
    /// Opens the persistent session.
    fn connect(&mut self) -> Result<(), PexError>;
    /// Copies a local file to a remote path.
    fn put(&mut self, local: &Path, remote: &str) -> Result<(), PexError>;
    /// Runs a shell command on the remote host.
    fn run(&mut self, command: &str) -> Result<CommandOutput, PexError>;
    /// Copies a remote file to a local path.
    fn get(&mut self, remote: &str, local: &Path) -> Result<(), PexError>;
    /// Closes the session.
    fn close(&mut self) -> Result<(), PexError>;
}

/// Everything the far side needs to run a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteBundle {
    /// Bundle schema version.
    pub schema: SchemaVersion,
    /// Study name.
    pub name: String,
    /// Strategy the points were sampled from.
    pub strategy: StrategySpec,
    /// Materialized points, already expanded by run count.
    pub points: Vec<ParameterPoint>,
    /// Base document.
    pub base_document: Document,
    /// Executable file name, relative to the bundle's directory.
    pub executable: String,
    /// Arguments appended to the executable contract.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Per-batch settings including QoI names and worker count.
    pub settings: BatchSettings,
    /// Changes applied after the sampled parameters.
    #[serde(default)]
    pub post_changes: Vec<PostChange>,
    /// Master seed.
    pub seed: u64,
    /// Zero-padding width of job names.
    pub id_width: usize,
}

impl RemoteBundle {
    /// Writes the bundle as JSON. Document keys keep their order so
    /// first-match addresses resolve the same way on the far side.
    pub fn write(&self, path: &Path) -> Result<(), PexError> {
        let bytes = to_json_bytes(self)?;
        fs::write(path, bytes).map_err(|err| PexError::io("bundle_write", path, err))
    }

    /// Reads a bundle and checks its schema.
    pub fn read(path: &Path) -> Result<Self, PexError> {
        let bytes = fs::read(path).map_err(|err| PexError::io("bundle_read", path, err))?;
        let bundle: RemoteBundle = from_json_slice(&bytes)?;
        check_schema(bundle.schema)?;
        Ok(bundle)
    }
}

/// Job results returned by the far side, QoI tables included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResults {
    /// Schema version.
    pub schema: SchemaVersion,
    /// One result per job.
    pub results: Vec<JobResult>,
}

impl RemoteResults {
    /// Writes the results as JSON.
    pub fn write(&self, path: &Path) -> Result<(), PexError> {
        let bytes = to_json_bytes(self)?;
        fs::write(path, bytes).map_err(|err| PexError::io("results_write", path, err))
    }

    /// Reads results and checks their schema.
    pub fn read(path: &Path) -> Result<Self, PexError> {
        let bytes = fs::read(path).map_err(|err| PexError::io("results_read", path, err))?;
        let results: RemoteResults = from_json_slice(&bytes)?;
        check_schema(results.schema)?;
        Ok(results)
    }
}

fn check_schema(found: SchemaVersion) -> Result<(), PexError> {
    if found.major != BUNDLE_SCHEMA.major {
        return Err(PexError::Serde(
            ErrorInfo::new("bundle.schema", "unsupported bundle schema")
                .with_context("found", format!("{}.{}.{}", found.major, found.minor, found.patch))
                .with_context(
                    "expected",
                    format!("{}.{}.{}", BUNDLE_SCHEMA.major, BUNDLE_SCHEMA.minor, BUNDLE_SCHEMA.patch),
                ),
        ));
    }
    Ok(())
}

/// Quotes a word for a POSIX shell.
pub fn shell_quote(word: &str) -> String {
    if word.is_empty() {
        "''".to_string()
    } else if word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:=@".contains(c))
    {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\"'\"'"))
    }
}

/// Runs a bundle on the remote host and brings its outputs into `workspace`.
///
/// Protocol: connect, create a scratch directory, upload the executable and
/// bundle, run the worker, pack the output tree, download and unpack the
/// archive, download the results, remove the scratch directory. The scratch
/// directory is removed and the session closed even when a step fails;
/// anything already unpacked locally is left in place.
pub fn run_remote(
    executor: &mut dyn RemoteExecutor,
    spec: &RemoteSpec,
    bundle: &RemoteBundle,
    executable: &Path,
    workspace: &Path,
) -> Result<RemoteResults, PexError> {
    info!(host = %spec.host, jobs = bundle.points.len(), "starting remote session");
    executor.connect()?;

    let scratch = match create_scratch(executor, &spec.scratch_root) {
        Ok(scratch) => scratch,
        Err(err) => {
            if let Err(close_err) = executor.close() {
                warn!(error = %close_err, "closing remote session failed");
            }
            return Err(err);
        }
    };
    debug!(scratch = %scratch, "created remote scratch directory");

    let outcome = remote_session(executor, spec, bundle, executable, workspace, &scratch);

    if let Err(err) = executor.run(&format!("rm -rf {}", shell_quote(&scratch))) {
        warn!(scratch = %scratch, error = %err, "removing remote scratch directory failed");
    }
    let closed = executor.close();
    let results = outcome?;
    closed?;
    info!(host = %spec.host, results = results.results.len(), "remote session finished");
    Ok(results)
}

fn create_scratch(executor: &mut dyn RemoteExecutor, scratch_root: &str) -> Result<String, PexError> {
    let output = executor.run(&format!(
        "mkdir -p {root} && mktemp -d {root}/pex.XXXXXX",
        root = shell_quote(scratch_root)
    ))?;
    let scratch = output.stdout.trim().to_string();
    if scratch.is_empty() {
        return Err(remote_error("remote.scratch", "remote host did not report a scratch directory"));
    }
    Ok(scratch)
}

fn remote_session(
    executor: &mut dyn RemoteExecutor,
    spec: &RemoteSpec,
    bundle: &RemoteBundle,
    executable: &Path,
    workspace: &Path,
    scratch: &str,
) -> Result<RemoteResults, PexError> {
    let remote = |name: &str| format!("{scratch}/{name}");
    let staging = tempfile::tempdir().map_err(|err| remote_error("remote.staging", err.to_string()))?;

    executor.put(executable, &remote(&bundle.executable))?;
    executor.run(&format!("chmod +x {}", shell_quote(&remote(&bundle.executable))))?;
    let cli = match &spec.remote_cli {
        Some(local_cli) => {
            executor.put(local_cli, &remote(REMOTE_CLI))?;
            executor.run(&format!("chmod +x {}", shell_quote(&remote(REMOTE_CLI))))?;
            remote(REMOTE_CLI)
        }
        None => REMOTE_CLI.to_string(),
    };
    let local_bundle = staging.path().join(BUNDLE_FILE);
    bundle.write(&local_bundle)?;
    executor.put(&local_bundle, &remote(BUNDLE_FILE))?;

    info!("running batch on remote host");
    executor.run(&format!(
        "cd {scratch} && {cli} remote-worker --bundle {bundle} --out {out} --results {results}",
        scratch = shell_quote(scratch),
        cli = shell_quote(&cli),
        bundle = BUNDLE_FILE,
        out = OUTPUT_DIR,
        results = RESULTS_FILE,
    ))?;
    executor.run(&format!(
        "cd {scratch} && {cli} pack --root {out} --archive {archive}",
        scratch = shell_quote(scratch),
        cli = shell_quote(&cli),
        out = OUTPUT_DIR,
        archive = ARCHIVE_FILE,
    ))?;

    let local_archive: PathBuf = staging.path().join(ARCHIVE_FILE);
    executor.get(&remote(ARCHIVE_FILE), &local_archive)?;
    let files = unpack_archive(&local_archive, workspace).map_err(|err| {
        PexError::Remote(
            ErrorInfo::new("remote.decompress", err.to_string())
                .with_context("archive", local_archive.display().to_string()),
        )
    })?;
    debug!(files, "unpacked remote output tree");

    let local_results = staging.path().join(RESULTS_FILE);
    executor.get(&remote(RESULTS_FILE), &local_results)?;
    RemoteResults::read(&local_results).map_err(|err| {
        PexError::Remote(ErrorInfo::new("remote.results", err.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::shell_quote;

    #[test]
    fn quoting_leaves_plain_words_alone() {
        assert_eq!(shell_quote("/tmp/pex.ab12"), "/tmp/pex.ab12");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), "'it'\"'\"'s'");
    }

    proptest::proptest! {
        #[test]
        fn quoted_words_contain_no_bare_whitespace(word in "[ -~]{0,24}") {
            let quoted = shell_quote(&word);
            if word.chars().any(char::is_whitespace) {
                proptest::prop_assert!(quoted.starts_with('\''));
            }
            proptest::prop_assert!(!quoted.is_empty());
        }
    }
}
