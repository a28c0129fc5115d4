//! Structured error types shared across pex crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`PexError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (addresses, job names, paths, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the parameter explorer.
///
/// Path, mutation, sampling and configuration failures are batch-fatal and
/// surface before any job is dispatched. Per-job failures are never reported
/// through this type; they are recorded in the job result instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum PexError {
    /// Address parsing and document path resolution errors.
    #[error("path error: {0}")]
    Path(ErrorInfo),
    /// Document mutation errors (type mismatch, failed post-condition).
    #[error("mutation error: {0}")]
    Mutation(ErrorInfo),
    /// Sampling strategy configuration errors.
    #[error("sampling error: {0}")]
    Sampling(ErrorInfo),
    /// Study configuration errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Job environment and dispatch infrastructure errors.
    #[error("job error: {0}")]
    Job(ErrorInfo),
    /// Remote session, transfer and decompression errors.
    #[error("remote error: {0}")]
    Remote(ErrorInfo),
    /// Filesystem errors.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Quantity-of-interest parsing and aggregation errors.
    #[error("qoi error: {0}")]
    Qoi(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl PexError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            PexError::Path(info)
            | PexError::Mutation(info)
            | PexError::Sampling(info)
            | PexError::Config(info)
            | PexError::Job(info)
            | PexError::Remote(info)
            | PexError::Io(info)
            | PexError::Serde(info)
            | PexError::Qoi(info) => info,
        }
    }

    /// Builds an [`PexError::Io`] from a filesystem error and the path it concerned.
    pub fn io(code: &str, path: impl AsRef<std::path::Path>, err: impl ToString) -> Self {
        PexError::Io(
            ErrorInfo::new(code, err.to_string())
                .with_context("path", path.as_ref().display().to_string()),
        )
    }
}
