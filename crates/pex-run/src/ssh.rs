//! [`RemoteExecutor`] backed by the system `ssh` and `scp` binaries.
//!
//! A control master keeps a single authenticated connection open for the
//! whole session; every later `ssh`/`scp` call multiplexes over it.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use pex_core::{ErrorInfo, PexError};
use tempfile::TempDir;
use tracing::debug;

use crate::remote::{remote_error, shell_quote, CommandOutput, RemoteExecutor};
use crate::study::RemoteSpec;

/// Persistent ssh session to one host.
#[derive(Debug)]
pub struct SshExecutor {
    host: String,
    options: Vec<String>,
    control_dir: Option<TempDir>,
}

impl SshExecutor {
    /// Session for the host described by `spec`; nothing is opened until
    /// [`RemoteExecutor::connect`].
    pub fn new(spec: &RemoteSpec) -> Self {
        Self {
            host: spec.host.clone(),
            options: spec.ssh_options.clone(),
            control_dir: None,
        }
    }

    fn control_path(&self) -> Result<String, PexError> {
        self.control_dir
            .as_ref()
            .map(|dir| dir.path().join("control").display().to_string())
            .ok_or_else(|| remote_error("remote.not_connected", "ssh session is not connected"))
    }

    fn common_args(&self) -> Result<Vec<String>, PexError> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path()?),
        ];
        args.extend(self.options.iter().cloned());
        Ok(args)
    }

    fn invoke(&self, program: &str, args: &[String], code: &str) -> Result<Output, PexError> {
        debug!(program, args = ?args, "invoking");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                PexError::Remote(
                    ErrorInfo::new(code, format!("failed to start {program}: {err}"))
                        .with_context("host", self.host.clone()),
                )
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PexError::Remote(
                ErrorInfo::new(code, format!("{program} exited with {}", output.status))
                    .with_context("host", self.host.clone())
                    .with_hint(stderr),
            ));
        }
        Ok(output)
    }
}

impl RemoteExecutor for SshExecutor {
    fn connect(&mut self) -> Result<(), PexError> {
        let dir = tempfile::Builder::new()
            .prefix("pex-ssh-")
            .tempdir()
            .map_err(|err| remote_error("remote.connect", err.to_string()))?;
        self.control_dir = Some(dir);
        let mut args = self.common_args()?;
        args.extend([
            "-o".to_string(),
            "ControlMaster=yes".to_string(),
            "-o".to_string(),
            "ControlPersist=yes".to_string(),
            "-fN".to_string(),
            self.host.clone(),
        ]);
        self.invoke("ssh", &args, "remote.connect").map(|_| ())
    }

    fn put(&mut self, local: &Path, remote: &str) -> Result<(), PexError> {
        let mut args = self.common_args()?;
        args.extend([
            "-q".to_string(),
            local.display().to_string(),
            format!("{}:{}", self.host, remote),
        ]);
        self.invoke("scp", &args, "remote.put").map(|_| ())
    }

    fn run(&mut self, command: &str) -> Result<CommandOutput, PexError> {
        let mut args = self.common_args()?;
        args.extend([self.host.clone(), format!("sh -c {}", shell_quote(command))]);
        let output = self.invoke("ssh", &args, "remote.run")?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn get(&mut self, remote: &str, local: &Path) -> Result<(), PexError> {
        let mut args = self.common_args()?;
        args.extend([
            "-q".to_string(),
            format!("{}:{}", self.host, remote),
            local.display().to_string(),
        ]);
        self.invoke("scp", &args, "remote.get").map(|_| ())
    }

    fn close(&mut self) -> Result<(), PexError> {
        if self.control_dir.is_none() {
            return Ok(());
        }
        let mut args = self.common_args()?;
        args.extend(["-O".to_string(), "exit".to_string(), self.host.clone()]);
        let result = self.invoke("ssh", &args, "remote.close").map(|_| ());
        self.control_dir = None;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_require_a_connection() {
        let spec = RemoteSpec {
            host: "user@example".into(),
            scratch_root: "/tmp".into(),
            remote_cli: None,
            ssh_options: vec!["-o".into(), "Port=2222".into()],
        };
        let mut ssh = SshExecutor::new(&spec);
        assert_eq!(ssh.run("true").unwrap_err().info().code, "remote.not_connected");
        assert!(ssh.close().is_ok());
    }
}
