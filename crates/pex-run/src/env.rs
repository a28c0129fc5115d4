//! Per-job directories under the workspace root.

use std::fs;
use std::path::{Path, PathBuf};

use pex_core::{job_name, PexError};
use pex_doc::{Document, DocumentFormat};
use tracing::debug;

use crate::job::{JobDescriptor, STATUS_FILE};

/// Name of the executable's output directory inside a job directory.
pub const OUTPUT_DIR: &str = "output";

/// Allocates one directory per `(parameter_id, run_id)` under a workspace
/// root that this process owns exclusively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEnvironment {
    root: PathBuf,
    id_width: usize,
}

impl JobEnvironment {
    /// Creates the workspace root if needed.
    pub fn new(root: impl Into<PathBuf>, id_width: usize) -> Result<Self, PexError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| PexError::io("workspace_create", &root, err))?;
        Ok(Self { root, id_width })
    }

    /// Workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Zero-padded job name.
    pub fn job_name(&self, parameter_id: usize, run_id: usize) -> String {
        job_name(parameter_id, run_id, self.id_width)
    }

    /// Descriptor for a job without touching the filesystem.
    pub fn descriptor(&self, parameter_id: usize, run_id: usize, format: DocumentFormat) -> JobDescriptor {
        let name = self.job_name(parameter_id, run_id);
        let dir = self.root.join(&name);
        JobDescriptor {
            parameter_id,
            run_id,
            input: dir.join(input_file_name(format)),
            output: dir.join(OUTPUT_DIR),
            name,
            dir,
        }
    }

    /// Recreates the job directory from scratch and writes the variant into it.
    ///
    /// The returned output location does not exist yet.
    pub fn allocate(&self, parameter_id: usize, run_id: usize, document: &Document) -> Result<JobDescriptor, PexError> {
        let job = self.descriptor(parameter_id, run_id, document.format());
        if job.dir.exists() {
            debug!(job = %job.name, "removing previous job directory");
            fs::remove_dir_all(&job.dir).map_err(|err| PexError::io("job_dir_remove", &job.dir, err))?;
        }
        fs::create_dir_all(&job.dir).map_err(|err| PexError::io("job_dir_create", &job.dir, err))?;
        document.save(&job.input)?;
        Ok(job)
    }

    /// Job directories holding a `status.json`, sorted by name.
    pub fn finished_jobs(&self) -> Result<Vec<PathBuf>, PexError> {
        let entries = fs::read_dir(&self.root).map_err(|err| PexError::io("workspace_read", &self.root, err))?;
        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| PexError::io("workspace_entry", &self.root, err))?;
            let path = entry.path();
            if path.is_dir() && path.join(STATUS_FILE).is_file() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

fn input_file_name(format: DocumentFormat) -> &'static str {
    match format {
        DocumentFormat::Json => "input.json",
        DocumentFormat::Yaml => "input.yaml",
    }
}
