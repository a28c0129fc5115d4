use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use pex_run::{collect_workspace, load_study};

use super::{exit_code, print_summary};

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// YAML study file whose workspace is collected.
    #[arg(long)]
    pub study: PathBuf,
}

pub fn run(args: &CollectArgs) -> Result<ExitCode, Box<dyn Error>> {
    let study = load_study(&args.study)?;
    let outcome = collect_workspace(&study)?;
    print_summary(&outcome);
    Ok(exit_code(&outcome))
}
