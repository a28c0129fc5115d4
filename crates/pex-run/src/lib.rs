#![deny(missing_docs)]
#![doc = "Execution side of pex: study configuration, batch preparation, per-job environments, the process backend, local and remote dispatch, and result finalization."]

pub mod archive;
pub mod backend;
pub mod batch;
pub mod dispatch;
pub mod env;
pub mod job;
pub mod prepare;
pub mod remote;
pub mod report;
pub mod ssh;
pub mod study;
mod ulam;

pub use archive::{pack_dir, unpack_archive};
pub use backend::{ExecOutcome, ExecutionBackend, ProcessBackend};
pub use batch::{
    collect_workspace, execute_bundle, materialize_study, run_study, run_study_local,
    run_study_remote, BatchOutcome,
};
pub use dispatch::{dispatch_local, effective_workers, BatchSettings};
pub use env::JobEnvironment;
pub use job::{FailureKind, JobDescriptor, JobFailure, JobResult};
pub use prepare::{prepare_batch, sample_points, PreparedBatch, PreparedJob};
pub use remote::{run_remote, CommandOutput, RemoteBundle, RemoteExecutor, RemoteResults};
pub use report::{BatchReport, FailureExcerpt, Totals};
pub use ssh::SshExecutor;
pub use study::{load_study, BoxUlamSpec, RemoteSpec, Study};
