use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use pex_run::{load_study, materialize_study};

#[derive(Args, Debug)]
pub struct MaterializeArgs {
    /// YAML study file.
    #[arg(long)]
    pub study: PathBuf,
}

pub fn run(args: &MaterializeArgs) -> Result<ExitCode, Box<dyn Error>> {
    let study = load_study(&args.study)?;
    let jobs = materialize_study(&study)?;
    for job in &jobs {
        println!("{}", job.input.display());
    }
    Ok(ExitCode::SUCCESS)
}
