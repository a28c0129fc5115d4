use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use pex_run::pack_dir;
use tracing::info;

#[derive(Args, Debug)]
pub struct PackArgs {
    /// Directory to archive.
    #[arg(long)]
    pub root: PathBuf,
    /// Zip file written.
    #[arg(long)]
    pub archive: PathBuf,
}

pub fn run(args: &PackArgs) -> Result<ExitCode, Box<dyn Error>> {
    let files = pack_dir(&args.root, &args.archive)?;
    info!(files, archive = %args.archive.display(), "packed output tree");
    Ok(ExitCode::SUCCESS)
}
