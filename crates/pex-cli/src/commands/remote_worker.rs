use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use pex_run::execute_bundle;
use tracing::info;

#[derive(Args, Debug)]
pub struct RemoteWorkerArgs {
    /// Bundle shipped by the orchestrator.
    #[arg(long)]
    pub bundle: PathBuf,
    /// Workspace the jobs run in.
    #[arg(long)]
    pub out: PathBuf,
    /// Results file read back by the orchestrator.
    #[arg(long)]
    pub results: PathBuf,
}

/// Job failures travel inside the results file, so this exits 0 unless the
/// batch itself could not run.
pub fn run(args: &RemoteWorkerArgs) -> Result<ExitCode, Box<dyn Error>> {
    let results = execute_bundle(&args.bundle, &args.out, &args.results)?;
    let passed = results.results.iter().filter(|result| result.success).count();
    info!(passed, total = results.results.len(), "bundle finished");
    Ok(ExitCode::SUCCESS)
}
