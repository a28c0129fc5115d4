use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use pex_run::{load_study, run_study};

use super::{exit_code, print_summary};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML study file.
    #[arg(long)]
    pub study: PathBuf,
    /// Override the study's worker count.
    #[arg(long)]
    pub workers: Option<usize>,
    /// Override the study's master seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Ignore the study's remote host and use the local pool.
    #[arg(long)]
    pub local: bool,
}

pub fn run(args: &RunArgs) -> Result<ExitCode, Box<dyn Error>> {
    let mut study = load_study(&args.study)?;
    if let Some(workers) = args.workers {
        study.workers = workers;
    }
    if let Some(seed) = args.seed {
        study.seed = seed;
    }
    if args.local {
        study.remote = None;
    }
    study.validate()?;
    let outcome = run_study(&study)?;
    print_summary(&outcome);
    Ok(exit_code(&outcome))
}
