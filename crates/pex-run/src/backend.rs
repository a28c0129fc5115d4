//! Invoking the external executable for one job.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::job::{FailureKind, JobDescriptor, JobFailure};

const STDOUT_LOG: &str = "stdout.log";
const STDERR_LOG: &str = "stderr.log";
const DEFAULT_POLL_INTERVAL_MILLIS: u64 = 20;
const EXCERPT_LINES: usize = 20;

/// What happened when a job's process ran.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    /// Exit code if the process ended on its own with one.
    pub exit_code: Option<i32>,
    /// Elapsed wall time.
    pub wall_time: Duration,
    /// Set when the process was killed by the timeout.
    pub timed_out: bool,
    /// Why the process could not be started, if it was not.
    pub spawn_error: Option<String>,
    /// Captured output tail, filled in for failures only.
    pub diagnostics: String,
}

impl ExecOutcome {
    /// Exit code 0 is the only success.
    pub fn succeeded(&self) -> bool {
        self.spawn_error.is_none() && !self.timed_out && self.exit_code == Some(0)
    }

    /// Failure classification, `None` on success.
    pub fn failure(&self) -> Option<JobFailure> {
        let (kind, message) = if let Some(err) = &self.spawn_error {
            (FailureKind::Spawn, format!("failed to start executable: {err}"))
        } else if self.timed_out {
            (
                FailureKind::Timeout,
                format!("timed out after {:.1}s", self.wall_time.as_secs_f64()),
            )
        } else {
            match self.exit_code {
                Some(0) => return None,
                Some(code) => (FailureKind::ProcessError, format!("exited with code {code}")),
                None => (FailureKind::ProcessError, "terminated by signal".to_string()),
            }
        };
        Some(JobFailure {
            kind,
            message,
            excerpt: self.diagnostics.clone(),
        })
    }
}

/// Runs one job to completion.
///
/// Implementations never return an error for job-level problems; timeouts,
/// nonzero exits and spawn failures are reported in the outcome.
pub trait ExecutionBackend: Send + Sync {
    /// Runs the job, killing it once `timeout` elapses.
    fn run(&self, job: &JobDescriptor, timeout: Option<Duration>) -> ExecOutcome;
}

/// Spawns `<executable> --input <file> --output <dir> [--timeout-seconds N] [extra...]`
/// in the job directory with stdout and stderr captured to log files there.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    executable: PathBuf,
    extra_args: Vec<String>,
    poll_interval: Duration,
}

impl ProcessBackend {
    /// Backend for the given executable.
    pub fn new(executable: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            extra_args,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MILLIS),
        }
    }

    /// Overrides how often a running process is polled.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn command(&self, job: &JobDescriptor, timeout: Option<Duration>) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg("--input")
            .arg(&job.input)
            .arg("--output")
            .arg(&job.output);
        if let Some(timeout) = timeout {
            command
                .arg("--timeout-seconds")
                .arg(timeout.as_secs().max(1).to_string());
        }
        command.args(&self.extra_args).current_dir(&job.dir).stdin(Stdio::null());
        command
    }
}

impl ExecutionBackend for ProcessBackend {
    fn run(&self, job: &JobDescriptor, timeout: Option<Duration>) -> ExecOutcome {
        let started_at = Instant::now();
        let spawn_failure = |err: String| ExecOutcome {
            exit_code: None,
            wall_time: started_at.elapsed(),
            timed_out: false,
            spawn_error: Some(err),
            diagnostics: String::new(),
        };

        let (stdout, stderr) = match (
            File::create(job.dir.join(STDOUT_LOG)),
            File::create(job.dir.join(STDERR_LOG)),
        ) {
            (Ok(stdout), Ok(stderr)) => (stdout, stderr),
            (Err(err), _) | (_, Err(err)) => return spawn_failure(format!("cannot create log file: {err}")),
        };
        let mut child = match self
            .command(job, timeout)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
        {
            Ok(child) => child,
            Err(err) => return spawn_failure(err.to_string()),
        };
        debug!(job = %job.name, pid = child.id(), "spawned executable");

        let (exit_code, timed_out) = loop {
            match child.try_wait() {
                Ok(Some(status)) => break (status.code(), false),
                Ok(None) => {
                    if timeout.is_some_and(|limit| started_at.elapsed() >= limit) {
                        let _ = child.kill();
                        let code = child.wait().ok().and_then(|status| status.code());
                        break (code, true);
                    }
                    thread::sleep(self.poll_interval);
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return spawn_failure(format!("failed to wait for executable: {err}"));
                }
            }
        };

        let mut outcome = ExecOutcome {
            exit_code: if timed_out { None } else { exit_code },
            wall_time: started_at.elapsed(),
            timed_out,
            spawn_error: None,
            diagnostics: String::new(),
        };
        if !outcome.succeeded() {
            outcome.diagnostics = capture_diagnostics(&job.dir);
        }
        outcome
    }
}

fn capture_diagnostics(dir: &Path) -> String {
    [("stdout", STDOUT_LOG), ("stderr", STDERR_LOG)]
        .iter()
        .filter_map(|(label, file)| {
            let text = fs::read_to_string(dir.join(file)).ok()?;
            let tail = tail_lines(&text, EXCERPT_LINES);
            (!tail.is_empty()).then(|| format!("--- {label} ---\n{tail}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}
